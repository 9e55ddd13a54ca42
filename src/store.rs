//! Hosted table store seam (PostgREST / Supabase).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use url::Url;

use crate::config::Config;
use crate::logging::{info, obj, v_str, warn, Domain};
use crate::risk::ScoredRow;

pub type Row = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store url: {0}")]
    InvalidUrl(String),
    #[error("store not configured; set SUPABASE_URL and SUPABASE_KEY")]
    NotConfigured,
    #[error("network error: {0}")]
    Network(String),
    #[error("store error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("invalid store response: {0}")]
    InvalidResponse(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError>;
}

pub struct RestTableStore {
    client: Client,
    base: Url,
    key: String,
}

impl RestTableStore {
    pub fn new(base: &str, key: impl Into<String>) -> Result<Self, StoreError> {
        let base = Url::parse(base).map_err(|e| StoreError::InvalidUrl(format!("{}: {}", base, e)))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(base.to_string()));
        }
        Ok(Self {
            client: Client::new(),
            base,
            key: key.into(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, StoreError> {
        match (cfg.supabase_url.as_deref(), cfg.supabase_key.as_deref()) {
            (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => Self::new(url, key),
            _ => Err(StoreError::NotConfigured),
        }
    }

    /// `{base}/rest/v1/{table}?select=*`
    pub fn table_url(&self, table: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["rest", "v1", table]);
        }
        url.query_pairs_mut().clear().append_pair("select", "*");
        url
    }
}

#[async_trait]
impl TableStore for RestTableStore {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let url = self.table_url(table);
        let resp = self
            .client
            .get(url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| StoreError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let rows: Vec<Row> = serde_json::from_str(&body).map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        info(Domain::Store, "fetched", obj(&[("table", v_str(table)), ("rows", json!(rows.len()))]));
        Ok(rows)
    }
}

/// In-memory store keyed by table name.
#[derive(Debug, Default, Clone)]
pub struct StaticTableStore {
    tables: HashMap<String, Vec<Row>>,
}

impl StaticTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(table.to_string(), rows);
        self
    }
}

#[async_trait]
impl TableStore for StaticTableStore {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }
}

/// Fetch a table, treating any failure as an empty table.
pub async fn fetch_or_empty(store: &dyn TableStore, table: &str) -> Vec<Row> {
    match store.fetch_all(table).await {
        Ok(rows) => {
            if rows.is_empty() {
                info(Domain::Store, "no_data", obj(&[("table", v_str(table))]));
            }
            rows
        }
        Err(err) => {
            warn(
                Domain::Store,
                "fetch_failed",
                obj(&[("table", v_str(table)), ("error", v_str(&err.to_string()))]),
            );
            Vec::new()
        }
    }
}

/// Rows that carry numeric impact, likelihood and risk score; the rest are
/// skipped with a count in the log.
pub fn scored_rows(rows: &[Row]) -> Vec<ScoredRow> {
    let scored: Vec<ScoredRow> = rows.iter().filter_map(ScoredRow::from_row).collect();
    let skipped = rows.len() - scored.len();
    if skipped > 0 {
        warn(
            Domain::Risk,
            "rows_skipped",
            obj(&[("skipped", json!(skipped)), ("kept", json!(scored.len()))]),
        );
    }
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_table_url() {
        let store = RestTableStore::new("https://abc.supabase.co", "k").unwrap();
        assert_eq!(
            store.table_url("incidents").as_str(),
            "https://abc.supabase.co/rest/v1/incidents?select=*"
        );
        let store = RestTableStore::new("https://abc.supabase.co/", "k").unwrap();
        assert_eq!(
            store.table_url("risk table").as_str(),
            "https://abc.supabase.co/rest/v1/risk%20table?select=*"
        );
    }

    #[test]
    fn test_config_requires_url_and_key() {
        let cfg = Config::default();
        assert!(matches!(RestTableStore::from_config(&cfg), Err(StoreError::NotConfigured)));
        assert!(matches!(RestTableStore::new("not a url", "k"), Err(StoreError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_or_empty_swallows_errors() {
        let store = StaticTableStore::new().with_table("incidents", vec![row(json!({"impact": 1}))]);
        assert_eq!(fetch_or_empty(&store, "incidents").await.len(), 1);
        assert!(fetch_or_empty(&store, "missing").await.is_empty());
    }

    #[test]
    fn test_scored_rows_skip_incomplete() {
        let rows = vec![
            row(json!({"impact": 5, "likelihood": 5, "risk_score": 25})),
            row(json!({"impact": 2, "location": "ICU"})),
        ];
        let scored = scored_rows(&rows);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].risk_score, 25.0);
    }
}
