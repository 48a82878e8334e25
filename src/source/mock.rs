//! Deterministic stand-in data for running the dashboard without a database.

use serde_json::json;

use crate::codec::decode;
use crate::error::Result;
use crate::source::RecordFetcher;
use crate::types::{MetricId, MetricType, StatMap, StatRecord};

const COMPUTED_ON: &str = "2023-10-01T12:00:00";

/// True-day share reported for every True Day Percentage identifier.
const TRUE_DAY_FRACTION: f64 = 0.6784;

#[derive(Debug, Default, Clone)]
pub struct MockStats;

impl MockStats {
    pub fn new() -> Self {
        Self
    }

    /// Synthesized record for `id`. Identifiers outside every band have none.
    pub fn record(id: MetricId) -> Option<StatRecord> {
        let stat_value = match decode(id)? {
            MetricType::MaxRetracementTime | MetricType::MaxExtensionTime => time_histogram(),
            MetricType::MaxRetracement | MetricType::MaxExtensionSd => range_histogram(),
            MetricType::TrueDayPercentage => json!(TRUE_DAY_FRACTION.to_string()),
        };
        Some(StatRecord {
            metric_id: id,
            computed_on: Some(COMPUTED_ON.to_string()),
            stat_value,
        })
    }
}

impl RecordFetcher for MockStats {
    async fn fetch_records(&self, ids: &[MetricId]) -> Result<StatMap> {
        Ok(ids
            .iter()
            .filter_map(|&id| Self::record(id).map(|r| (id, r)))
            .collect())
    }
}

/// Thirty ten-minute bins from 10:30, peaking in the middle.
fn time_histogram() -> serde_json::Value {
    const BINS: usize = 30;
    let bins: Vec<String> = (0..BINS)
        .map(|i| {
            let minutes = 10 * 60 + 30 + i * 10;
            format!("{:02}:{:02}", minutes / 60, minutes % 60)
        })
        .collect();
    let middle = BINS as f64 / 2.0;
    let counts: Vec<u64> = (0..BINS)
        .map(|i| {
            let d = i as f64 - middle;
            (30.0 * (-d * d / 20.0).exp()).floor().max(1.0) as u64
        })
        .collect();
    json!(json!({ "bins": bins, "counts": counts }).to_string())
}

/// Bins of width 0.2 from -2.5 to 2.5, bell-shaped around zero.
fn range_histogram() -> serde_json::Value {
    let bins: Vec<serde_json::Value> = (0..=25)
        .map(|i| {
            let lo = -2.5 + 0.2 * i as f64;
            let count = (150.0 * (-lo * lo).exp()).floor().max(5.0) as u64;
            json!({ "bin": [round1(lo), round1(lo + 0.2)], "count": count })
        })
        .collect();
    json!(serde_json::Value::Array(bins).to_string())
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    #[tokio::test]
    async fn every_charted_band_normalizes() {
        let source = MockStats::new();
        let records = source.fetch_records(&[22, 322, 472, 622, 172, 5]).await.unwrap();
        assert_eq!(records.len(), 5);
        assert!(!records.contains_key(&5));

        let retracement = normalize(&records[&22]).unwrap();
        assert_eq!(retracement.labels.len(), 26);
        assert_eq!(retracement.labels[0], "-2.50");

        let timing = normalize(&records[&472]).unwrap();
        assert!(timing.time_based);
        assert_eq!(timing.labels.first().map(String::as_str), Some("10:30"));
        assert_eq!(timing.labels.last().map(String::as_str), Some("15:20"));

        assert_eq!(normalize(&records[&172]).unwrap().values, vec![TRUE_DAY_FRACTION]);
    }
}
