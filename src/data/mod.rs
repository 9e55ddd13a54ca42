//! Uploaded-table loading, schema inference and export manifests.

pub mod csv;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::logging::{log_export, log_schema, ts_now};

/// Literals read as a missing cell.
pub const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("no columns to parse from input")]
    Empty,
    #[error("unterminated quoted field starting on line {line}")]
    UnterminatedQuote { line: usize },
    #[error("expected {expected} fields on line {line}, saw {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("input is not valid UTF-8")]
    Encoding,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest encoding failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Coarse column type, labelled the way data-frame libraries report dtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    Object,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Bool => "bool",
            ColumnType::Object => "object",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub column_name: String,
    pub data_type: ColumnType,
}

/// Ordered (column name, inferred type) pairs for one uploaded table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub columns: Vec<ColumnSchema>,
}

impl SchemaDescriptor {
    /// Schema with every column typed as `object`, for callers that only know names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            columns: names
                .iter()
                .map(|n| ColumnSchema {
                    column_name: n.as_ref().to_string(),
                    data_type: ColumnType::Object,
                })
                .collect(),
        }
    }
}

/// A parsed table: header plus rows, each row as wide as the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |r| r[idx].as_str())
    }
}

pub fn is_missing(value: &str) -> bool {
    NA_VALUES.contains(&value)
}

pub fn load_table_str(text: &str) -> Result<Table, DataError> {
    let mut records = csv::parse_records(text)?.into_iter();
    let header = records.next().ok_or(DataError::Empty)?;
    let columns = dedupe_headers(header.fields);
    let width = columns.len();

    let mut rows = Vec::new();
    for rec in records {
        let found = rec.fields.len();
        if found > width {
            return Err(DataError::RaggedRow {
                line: rec.line,
                expected: width,
                found,
            });
        }
        let mut fields = rec.fields;
        fields.resize(width, String::new());
        rows.push(fields);
    }
    Ok(Table { columns, rows })
}

pub fn load_table<R: Read>(mut reader: R) -> Result<Table, DataError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let text = String::from_utf8(bytes).map_err(|_| DataError::Encoding)?;
    load_table_str(&text)
}

pub fn load_table_path(path: &Path) -> Result<Table, DataError> {
    load_table(File::open(path)?)
}

fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(raw.len());
    for (idx, name) in raw.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name
        };
        let mut candidate = base.clone();
        if seen.contains_key(&candidate) {
            let mut count = seen.get(&base).copied().unwrap_or(0);
            while seen.contains_key(&candidate) {
                count += 1;
                candidate = format!("{}.{}", base, count);
            }
            seen.insert(base, count);
        }
        seen.insert(candidate.clone(), 0);
        out.push(candidate);
    }
    out
}

fn is_bool_literal(v: &str) -> bool {
    matches!(v, "True" | "TRUE" | "true" | "False" | "FALSE" | "false")
}

pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = 0usize;
    let mut missing = 0usize;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;

    for raw in values {
        total += 1;
        if is_missing(raw) {
            missing += 1;
            continue;
        }
        let v = raw.trim();
        all_int &= v.parse::<i64>().is_ok();
        all_float &= v.parse::<f64>().is_ok();
        all_bool &= is_bool_literal(v);
    }

    if total == 0 {
        return ColumnType::Object;
    }
    if missing == total {
        return ColumnType::Float64;
    }
    if all_int {
        return if missing > 0 { ColumnType::Float64 } else { ColumnType::Int64 };
    }
    if all_float {
        return ColumnType::Float64;
    }
    if all_bool && missing == 0 {
        return ColumnType::Bool;
    }
    ColumnType::Object
}

pub fn infer_schema(table: &Table) -> SchemaDescriptor {
    let columns: Vec<ColumnSchema> = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| ColumnSchema {
            column_name: name.clone(),
            data_type: infer_column_type(table.column(idx)),
        })
        .collect();
    let types: Vec<(&str, &str)> = columns
        .iter()
        .map(|c| (c.column_name.as_str(), c.data_type.as_str()))
        .collect();
    log_schema(columns.len(), table.rows.len(), &types);
    SchemaDescriptor { columns }
}

// =============================================================================
// Export manifests
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub columns: Vec<String>,
    pub generator: String,
    pub sentinel: bool,
    pub generated_at: String,
}

pub fn bytes_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn default_manifest_path(export_path: &Path) -> PathBuf {
    let mut p = export_path.to_path_buf();
    let fname = export_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("export.csv");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

/// Write `csv_text` to `path` and its manifest next to it.
pub fn write_export(
    path: &Path,
    csv_text: &str,
    columns: Vec<String>,
    row_count: u64,
    generator: &str,
    sentinel: bool,
) -> Result<ExportManifest, DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, csv_text)?;
    let manifest = ExportManifest {
        path: path.display().to_string(),
        hash_sha256: bytes_sha256(csv_text.as_bytes()),
        row_count,
        columns,
        generator: generator.to_string(),
        sentinel,
        generated_at: ts_now(),
    };
    fs::write(default_manifest_path(path), serde_json::to_string_pretty(&manifest)?)?;
    log_export(&manifest.path, row_count as usize, &manifest.hash_sha256);
    Ok(manifest)
}
