use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::source::RecordFetcher;
use crate::types::{MetricId, StatMap, StatRecord};

/// Reads `computed_stats` rows from a PostgREST-style HTTP endpoint.
pub struct RestStats {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Row shape returned by the endpoint. `stat_value` may be text or JSON.
#[derive(Debug, Deserialize)]
struct StatRow {
    metric_id: MetricId,
    #[serde(default)]
    computed_on: Option<String>,
    #[serde(default)]
    stat_value: serde_json::Value,
}

impl RestStats {
    pub fn new(cfg: &Config) -> Result<Self> {
        let base_url = cfg
            .rest_url
            .clone()
            .ok_or_else(|| AppError::Config("REST_URL is not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.rest_timeout_secs))
            .build()?;
        Ok(Self { client, base_url, api_key: cfg.rest_api_key.clone() })
    }

    fn query_url(&self, ids: &[MetricId]) -> String {
        let list = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",");
        format!("{}/computed_stats?select=*&metric_id=in.({list})", self.base_url)
    }
}

impl RecordFetcher for RestStats {
    async fn fetch_records(&self, ids: &[MetricId]) -> Result<StatMap> {
        if ids.is_empty() {
            return Ok(StatMap::new());
        }

        let url = self.query_url(ids);
        debug!("GET {url}");
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key).bearer_auth(key);
        }

        let resp = req.send().await?.error_for_status()?;
        let body: serde_json::Value = resp.json().await?;
        let rows: Vec<StatRow> = match body {
            serde_json::Value::Array(_) => serde_json::from_value(body)?,
            _ => {
                return Err(AppError::Fetch(
                    "computed_stats response was not an array".to_string(),
                ))
            }
        };

        let fetched = rows.len();
        let records = latest_per_metric(rows);
        info!("Fetched {fetched} rows for {} ids ({} distinct metrics)", ids.len(), records.len());
        Ok(records)
    }
}

/// Keep the most recently computed row for each metric.
fn latest_per_metric(rows: Vec<StatRow>) -> StatMap {
    let mut out = StatMap::new();
    for row in rows {
        let newer = out
            .get(&row.metric_id)
            .map_or(true, |cur| row.computed_on >= cur.computed_on);
        if newer {
            out.insert(
                row.metric_id,
                StatRecord {
                    metric_id: row.metric_id,
                    computed_on: row.computed_on,
                    stat_value: row.stat_value,
                },
            );
        }
    }
    out
}
