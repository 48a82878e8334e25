//! Stats-source fetch latency.
//!
//! Only cache misses reach the source, so the histogram describes what a user
//! waits for when a filter selection is seen for the first time. Cache hits
//! are not recorded. Served as p50/p95/p99 by `GET /stats/latency`.

use std::sync::Mutex;
use std::time::Duration;

/// Wall-clock time of each `fetch_records` call, in microseconds, including
/// failed fetches.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    /// 1us to 100s at 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    /// Clamped into the tracked range: sub-microsecond fetches (the mock
    /// source) count as 1us, anything past 100s as 100s.
    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, 100_000_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    /// Fetch latency (p50_us, p95_us, p99_us). None until the first miss.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        (
            Some(h.value_at_quantile(0.5)),
            Some(h.value_at_quantile(0.95)),
            Some(h.value_at_quantile(0.99)),
        )
    }

    /// Number of fetches recorded.
    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
