use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::csv;

/// Label, impact and likelihood as produced by the model-backed generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidentScore {
    pub incident_type: String,
    pub impact: u8,
    pub likelihood: u8,
}

impl IncidentScore {
    pub fn new(incident_type: impl Into<String>, impact: u8, likelihood: u8) -> Self {
        Self {
            incident_type: incident_type.into(),
            impact,
            likelihood,
        }
    }

    pub fn risk_score(&self) -> u32 {
        self.impact as u32 * self.likelihood as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive fields carried only by faker-generated incidents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentDetails {
    pub department: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub description: String,
    pub severity: Severity,
    pub outcome: String,
    pub responsible_staff: String,
    pub action_taken: String,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: u64,
    pub incident_type: String,
    pub impact: u8,
    pub likelihood: u8,
    pub details: Option<IncidentDetails>,
}

impl IncidentRecord {
    pub fn from_score(id: u64, score: IncidentScore) -> Self {
        Self {
            id,
            incident_type: score.incident_type,
            impact: score.impact,
            likelihood: score.likelihood,
            details: None,
        }
    }

    pub fn risk_score(&self) -> u32 {
        self.impact as u32 * self.likelihood as u32
    }
}

pub const SCORED_COLUMNS: [&str; 5] = ["Incident ID", "Incident Type", "Impact", "Likelihood", "Risk Score"];

pub const DETAILED_COLUMNS: [&str; 14] = [
    "Incident Number",
    "Date",
    "Time",
    "Department",
    "Incident Type",
    "Description",
    "Severity",
    "Outcome",
    "Responsible Staff",
    "Action Taken",
    "Priority",
    "Impact",
    "Likelihood",
    "Risk Score",
];

/// Sequentially numbered records from model output, ids 1..=n.
pub fn number_scores(scores: Vec<IncidentScore>) -> Vec<IncidentRecord> {
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| IncidentRecord::from_score(i as u64 + 1, s))
        .collect()
}

pub fn scored_csv(records: &[IncidentRecord]) -> String {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.incident_type.clone(),
                r.impact.to_string(),
                r.likelihood.to_string(),
                r.risk_score().to_string(),
            ]
        })
        .collect();
    csv::render(&SCORED_COLUMNS, &rows)
}

/// Faker records with their descriptive columns. Records without details
/// leave those columns empty.
pub fn detailed_csv(records: &[IncidentRecord]) -> String {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            let mut row = vec![r.id.to_string()];
            match &r.details {
                Some(d) => row.extend([
                    d.date.format("%Y-%m-%d").to_string(),
                    d.time.format("%H:%M:%S").to_string(),
                    d.department.clone(),
                    r.incident_type.clone(),
                    d.description.clone(),
                    d.severity.to_string(),
                    d.outcome.clone(),
                    d.responsible_staff.clone(),
                    d.action_taken.clone(),
                    d.priority.to_string(),
                ]),
                None => {
                    row.extend([String::new(), String::new(), String::new()]);
                    row.push(r.incident_type.clone());
                    row.extend(std::iter::repeat(String::new()).take(6));
                }
            }
            row.extend([
                r.impact.to_string(),
                r.likelihood.to_string(),
                r.risk_score().to_string(),
            ]);
            row
        })
        .collect();
    csv::render(&DETAILED_COLUMNS, &rows)
}

// =============================================================================
// Schema-shaped tables
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(i64),
    Text(String),
    Null,
}

impl Cell {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn render(&self) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Null => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// Column-ordered output table for schema-driven batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTable {
    pub columns: Vec<Column>,
    pub rows: usize,
}

impl GeneratedTable {
    pub fn new(rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows,
        }
    }

    /// Sets a column by exact name, replacing one that already exists.
    pub fn set_column(&mut self, name: &str, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.rows);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.cells = cells,
            None => self.columns.push(Column {
                name: name.to_string(),
                cells,
            }),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn header(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<String>> {
        (0..self.rows)
            .map(|i| self.columns.iter().map(|c| c.cells[i].render()).collect())
            .collect()
    }

    pub fn to_csv(&self) -> String {
        csv::render(&self.header(), &self.to_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_score_is_product() {
        let s = IncidentScore::new("Pressure Ulcer", 4, 5);
        assert_eq!(s.risk_score(), 20);
        let r = IncidentRecord::from_score(1, s);
        assert_eq!(r.risk_score(), 20);
    }

    #[test]
    fn test_numbering_starts_at_one() {
        let recs = number_scores(vec![
            IncidentScore::new("Fall", 1, 2),
            IncidentScore::new("Burn", 3, 3),
        ]);
        assert_eq!(recs.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_scored_csv_has_header_and_products() {
        let text = scored_csv(&number_scores(vec![IncidentScore::new("Equipment Failure", 5, 3)]));
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Incident ID,Incident Type,Impact,Likelihood,Risk Score"));
        assert_eq!(lines.next(), Some("1,Equipment Failure,5,3,15"));
    }

    #[test]
    fn test_detailed_csv_rows_match_header_width() {
        let rec = IncidentRecord::from_score(7, IncidentScore::new("Fall", 2, 2));
        let text = detailed_csv(&[rec]);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row.split(',').count(), DETAILED_COLUMNS.len());
        assert!(row.starts_with("7,,,,Fall,"));
        assert!(row.ends_with(",2,2,4"));
    }

    #[test]
    fn test_set_column_replaces_by_exact_name() {
        let mut t = GeneratedTable::new(1);
        t.set_column("Incident Type", vec![Cell::Null]);
        t.set_column("Incident Type", vec![Cell::Text("Fall".into())]);
        assert_eq!(t.columns.len(), 1);
        assert_eq!(t.to_csv(), "Incident Type\nFall\n");
    }
}
