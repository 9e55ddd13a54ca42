//! Chart-ready risk data from the hosted table store, printed as JSON.
//!
//! `risk_dashboard [TABLE]` where TABLE is `Risk_Heatmap` (default) or
//! `Incident_Dataset`. Fetch failures and empty tables print an empty view.

use anyhow::Result;
use serde_json::json;
use std::env;

use risksynth::config::Config;
use risksynth::logging::{obj, v_str, warn, Domain};
use risksynth::metrics::{GroupCounts, ValueCounts};
use risksynth::risk::{risk_ranking, RiskGrid, RiskMatrix};
use risksynth::store::{fetch_or_empty, scored_rows, RestTableStore, Row, TableStore};

const HEATMAP_TABLE: &str = "Risk_Heatmap";
const INCIDENT_TABLE: &str = "Incident_Dataset";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cfg = Config::from_env();
    let table = env::args().nth(1).unwrap_or_else(|| HEATMAP_TABLE.to_string());

    let rows: Vec<Row> = match RestTableStore::from_config(&cfg) {
        Ok(store) => fetch_or_empty(&store as &dyn TableStore, &table).await,
        Err(err) => {
            warn(
                Domain::Store,
                "store_unavailable",
                obj(&[("table", v_str(&table)), ("error", v_str(&err.to_string()))]),
            );
            Vec::new()
        }
    };

    let view = if table == INCIDENT_TABLE {
        json!({
            "table": table,
            "rows": rows.len(),
            "bubbles": GroupCounts::from_rows(&rows, &["severity_level", "likelihood", "incident_type"]),
            "locations": ValueCounts::from_rows(&rows, "location"),
        })
    } else {
        let scored = scored_rows(&rows);
        json!({
            "table": table,
            "rows": rows.len(),
            "scored_rows": scored.len(),
            "grid": RiskGrid::from_rows(&scored),
            "matrix": RiskMatrix::from_rows(&scored),
            "ranking": risk_ranking(&scored),
        })
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
