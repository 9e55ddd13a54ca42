use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::record::IncidentRecord;
use crate::risk::{categorize_risk, RiskLevel};
use crate::store::Row;

/// Occurrences per distinct value, most frequent first. Ties keep the order
/// in which values were first seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCounts {
    pub column: String,
    pub counts: Vec<(String, usize)>,
}

impl ValueCounts {
    pub fn from_values<I, S>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut counts: Vec<(String, usize)> = Vec::new();
        for v in values {
            let v = v.as_ref();
            match index.get(v) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(v.to_string(), counts.len());
                    counts.push((v.to_string(), 1));
                }
            }
        }
        // stable sort keeps first-seen order among equal counts
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Self {
            column: column.to_string(),
            counts,
        }
    }

    /// Counts over one column of fetched rows; missing and null cells are skipped.
    pub fn from_rows(rows: &[Row], column: &str) -> Self {
        let values = rows.iter().filter_map(|r| cell_text(r.get(column)?));
        Self::from_values(column, values)
    }

    pub fn get(&self, value: &str) -> usize {
        self.counts.iter().find(|(v, _)| v == value).map(|(_, c)| *c).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, c)| c).sum()
    }
}

/// Rows per distinct combination of `columns`, most frequent first. Rows
/// missing any of the columns are skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCounts {
    pub columns: Vec<String>,
    pub groups: Vec<(Vec<String>, usize)>,
}

impl GroupCounts {
    pub fn from_rows(rows: &[Row], columns: &[&str]) -> Self {
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<String>, usize)> = Vec::new();
        for row in rows {
            let key: Option<Vec<String>> = columns.iter().map(|c| cell_text(row.get(*c)?)).collect();
            let Some(key) = key else { continue };
            match index.get(&key) {
                Some(&i) => groups[i].1 += 1,
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, 1));
                }
            }
        }
        groups.sort_by(|a, b| b.1.cmp(&a.1));
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            groups,
        }
    }
}

fn cell_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Summary of one generated batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    pub incident_types: ValueCounts,
    pub risk_levels: Vec<(RiskLevel, usize)>,
    pub severity: Option<ValueCounts>,
    pub department: Option<ValueCounts>,
}

impl BatchSummary {
    pub fn from_records(records: &[IncidentRecord]) -> Self {
        let mut levels = [0usize; 4];
        for r in records {
            levels[level_index(categorize_risk(r.risk_score() as i64))] += 1;
        }
        let details: Vec<_> = records.iter().filter_map(|r| r.details.as_ref()).collect();
        let (severity, department) = if details.is_empty() {
            (None, None)
        } else {
            (
                Some(ValueCounts::from_values("Severity", details.iter().map(|d| d.severity.as_str()))),
                Some(ValueCounts::from_values("Department", details.iter().map(|d| d.department.as_str()))),
            )
        };
        Self {
            rows: records.len(),
            incident_types: ValueCounts::from_values("Incident Type", records.iter().map(|r| r.incident_type.as_str())),
            risk_levels: RiskLevel::ALL.iter().copied().zip(levels).collect(),
            severity,
            department,
        }
    }
}

fn level_index(level: RiskLevel) -> usize {
    match level {
        RiskLevel::VeryHigh => 0,
        RiskLevel::High => 1,
        RiskLevel::Medium => 2,
        RiskLevel::Low => 3,
    }
}
