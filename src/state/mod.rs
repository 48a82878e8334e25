pub mod filter_cache;
pub mod session;

#[cfg(test)]
pub mod testing;

pub use filter_cache::FilterCache;
pub use session::{ApplyOutcome, ChartState, DashboardSession};
