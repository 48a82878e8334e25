//! Stats sources: the collaborators that turn identifiers into stored records.

pub mod mock;
pub mod rest;

use std::future::Future;

use crate::db::StatReader;
use crate::error::Result;
use crate::types::{MetricId, StatMap};

pub use mock::MockStats;
pub use rest::RestStats;

/// Fetches stored records for a set of identifiers. Identifiers with no
/// stored record are simply absent from the returned map.
pub trait RecordFetcher: Send + Sync {
    fn fetch_records(&self, ids: &[MetricId]) -> impl Future<Output = Result<StatMap>> + Send;
}

/// The source selected by `DATA_SOURCE`.
pub enum StatSource {
    Sqlite(StatReader),
    Rest(RestStats),
    Mock(MockStats),
}

impl RecordFetcher for StatSource {
    async fn fetch_records(&self, ids: &[MetricId]) -> Result<StatMap> {
        match self {
            StatSource::Sqlite(s) => s.fetch_records(ids).await,
            StatSource::Rest(s) => s.fetch_records(ids).await,
            StatSource::Mock(s) => s.fetch_records(ids).await,
        }
    }
}
