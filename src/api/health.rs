//! Payload for the /health endpoint.

use std::time::Instant;

use serde::Serialize;

use crate::config::DataSource;

/// Process-level facts the health endpoint reports alongside cache counters.
pub struct HealthState {
    pub data_source: DataSource,
    pub started_at: Instant,
}

impl HealthState {
    pub fn new(data_source: DataSource) -> Self {
        Self { data_source, started_at: Instant::now() }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub data_source: String,
    pub uptime_secs: u64,
    pub cached_signatures: usize,
    pub fetches: u64,
    pub latest_seq: u64,
}
