//! Rows shaped like an uploaded table.

use rand::Rng;

use super::{SCORE_MAX, SCORE_MIN};
use crate::data::SchemaDescriptor;
use crate::logging::{info, obj, Domain};
use crate::record::{Cell, GeneratedTable};
use serde_json::json;

pub const INCIDENT_TYPE_COLUMN: &str = "Incident Type";
pub const RISK_SCORE_COLUMN: &str = "Risk Score";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillRule {
    Sequential,
    Score,
    Placeholder,
}

fn rule_for(name: &str) -> FillRule {
    match name.trim().to_lowercase().as_str() {
        "incident_id" => FillRule::Sequential,
        "likelihood" | "impact" => FillRule::Score,
        _ => FillRule::Placeholder,
    }
}

fn normalized(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Build `n` rows for the schema's columns, then derive `Risk Score`.
///
/// `incident_id` counts 1..=n, `impact` and `likelihood` are uniform in
/// 1..=6, every other column is null. Names are matched case-insensitively
/// after trimming.
pub fn fill_schema<R: Rng>(schema: &SchemaDescriptor, n: usize, rng: &mut R) -> GeneratedTable {
    let mut table = GeneratedTable::new(n);
    for col in &schema.columns {
        let cells = match rule_for(&col.column_name) {
            FillRule::Sequential => (1..=n as i64).map(Cell::Int).collect(),
            FillRule::Score => (0..n)
                .map(|_| Cell::Int(rng.gen_range(SCORE_MIN..=SCORE_MAX) as i64))
                .collect(),
            FillRule::Placeholder => vec![Cell::Null; n],
        };
        table.set_column(&col.column_name, cells);
    }

    let impact = first_column_named(&table, "impact");
    let likelihood = first_column_named(&table, "likelihood");
    let risk = match (impact, likelihood) {
        (Some(i), Some(l)) => (0..n)
            .map(|row| {
                match (table.columns[i].cells[row].as_int(), table.columns[l].cells[row].as_int()) {
                    (Some(a), Some(b)) => Cell::Int(a * b),
                    _ => Cell::Null,
                }
            })
            .collect(),
        _ => vec![Cell::Null; n],
    };
    table.set_column(RISK_SCORE_COLUMN, risk);

    info(
        Domain::Generate,
        "schema_filled",
        obj(&[
            ("rows", json!(n)),
            ("columns", json!(table.columns.len())),
            ("risk_derived", json!(impact.is_some() && likelihood.is_some())),
        ]),
    );
    table
}

fn first_column_named(table: &GeneratedTable, name: &str) -> Option<usize> {
    table.columns.iter().position(|c| normalized(&c.name) == name)
}

/// Set `Incident Type` from `labels` by position. Rows past the end of
/// `labels` are null.
pub fn merge_incident_types(table: &mut GeneratedTable, labels: &[String]) {
    let cells = (0..table.rows)
        .map(|i| labels.get(i).map(|l| Cell::Text(l.clone())).unwrap_or(Cell::Null))
        .collect();
    table.set_column(INCIDENT_TYPE_COLUMN, cells);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fill_rules_by_trimmed_lowercase_name() {
        let schema = SchemaDescriptor::from_names(&[" Incident_ID ", "IMPACT", "Likelihood", "Location"]);
        let mut rng = StdRng::seed_from_u64(7);
        let t = fill_schema(&schema, 4, &mut rng);

        let ids: Vec<_> = t.column(" Incident_ID ").unwrap().cells.iter().map(|c| c.as_int()).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3), Some(4)]);
        assert!(t.column("Location").unwrap().cells.iter().all(Cell::is_null));

        let impact = &t.column("IMPACT").unwrap().cells;
        let likelihood = &t.column("Likelihood").unwrap().cells;
        let risk = &t.column(RISK_SCORE_COLUMN).unwrap().cells;
        for row in 0..4 {
            let i = impact[row].as_int().unwrap();
            let l = likelihood[row].as_int().unwrap();
            assert!((1..=6).contains(&i) && (1..=6).contains(&l));
            assert_eq!(risk[row].as_int(), Some(i * l));
        }
        assert_eq!(t.header().last().map(String::as_str), Some(RISK_SCORE_COLUMN));
    }

    #[test]
    fn test_risk_is_null_without_both_factors() {
        let schema = SchemaDescriptor::from_names(&["impact", "notes"]);
        let mut rng = StdRng::seed_from_u64(1);
        let t = fill_schema(&schema, 3, &mut rng);
        assert!(t.column(RISK_SCORE_COLUMN).unwrap().cells.iter().all(Cell::is_null));
    }

    #[test]
    fn test_existing_risk_column_is_replaced_in_place() {
        let schema = SchemaDescriptor::from_names(&["Risk Score", "impact", "likelihood"]);
        let mut rng = StdRng::seed_from_u64(3);
        let t = fill_schema(&schema, 2, &mut rng);
        assert_eq!(t.columns.len(), 3);
        assert_eq!(t.columns[0].name, RISK_SCORE_COLUMN);
        assert!(t.columns[0].cells.iter().all(|c| c.as_int().is_some()));
    }

    #[test]
    fn test_merge_incident_types() {
        let schema = SchemaDescriptor::from_names(&["incident_id", "Incident Type"]);
        let mut rng = StdRng::seed_from_u64(0);
        let mut t = fill_schema(&schema, 2, &mut rng);
        merge_incident_types(&mut t, &["Fall".to_string(), "Burn".to_string()]);
        assert_eq!(t.columns[1].name, INCIDENT_TYPE_COLUMN);
        assert_eq!(t.columns[1].cells[1], Cell::Text("Burn".into()));

        let mut t = fill_schema(&SchemaDescriptor::from_names(&["incident_id"]), 2, &mut rng);
        merge_incident_types(&mut t, &["Fall".to_string()]);
        assert_eq!(t.header(), vec!["incident_id", "Risk Score", "Incident Type"]);
        assert!(t.columns[2].cells[1].is_null());
    }
}
