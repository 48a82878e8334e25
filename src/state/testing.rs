//! Scriptable stats source for cache and session tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use crate::error::{AppError, Result};
use crate::source::{MockStats, RecordFetcher};
use crate::types::{MetricId, StatMap, StatRecord};

#[derive(Default)]
pub struct CountingFetcher {
    requests: Mutex<Vec<Vec<MetricId>>>,
    failing: AtomicBool,
    active: AtomicUsize,
    peak: AtomicUsize,
    delay: Option<Duration>,
    /// Extra sleep for requests containing this identifier.
    slow_id: Option<(MetricId, Duration)>,
    /// Identifier returned even though nobody asked for it.
    extra: Option<MetricId>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_slow_id(mut self, id: MetricId, delay: Duration) -> Self {
        self.slow_id = Some((id, delay));
        self
    }

    pub fn with_extra(mut self, id: MetricId) -> Self {
        self.extra = Some(id);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Most fetches observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<MetricId>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl RecordFetcher for CountingFetcher {
    async fn fetch_records(&self, ids: &[MetricId]) -> Result<StatMap> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(ids.to_vec());
        }
        let failing = self.failing.load(Ordering::SeqCst);
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((slow, delay)) = self.slow_id {
            if ids.contains(&slow) {
                tokio::time::sleep(delay).await;
            }
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        if failing {
            return Err(AppError::Fetch("stats source unavailable".to_string()));
        }

        let mut out: StatMap = ids
            .iter()
            .filter_map(|&id| MockStats::record(id).map(|r| (id, r)))
            .collect();
        if let Some(extra) = self.extra {
            out.insert(
                extra,
                StatRecord { metric_id: extra, computed_on: None, stat_value: json!(1.0) },
            );
        }
        Ok(out)
    }
}
