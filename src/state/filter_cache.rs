use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::api::latency::LatencyStats;
use crate::error::Result;
use crate::source::RecordFetcher;
use crate::types::{ActiveFilters, Direction, MetricId, MetricType, StatMap, TimePeriod, Weekday};

/// Cache key for an active filter selection.
///
/// Day (or "all"), time periods, and actions mapped to directions. Tokens are
/// resolved the same way identifiers are encoded, so unrecognized input reads
/// as Monday / global and two selections share a key only when they expand to
/// the same identifiers. Lists are sorted and deduplicated since the
/// identifier set does not depend on selection order.
pub fn compute_signature(day: Option<&str>, time_periods: &[String], actions: &[String]) -> String {
    let day = day.map_or("all", |d| Weekday::from_token(d).unwrap_or(Weekday::Monday).token());

    let periods: BTreeSet<&str> = time_periods
        .iter()
        .map(|t| TimePeriod::from_token(t).unwrap_or(TimePeriod::GLOBAL).token())
        .collect();
    let directions: BTreeSet<&str> = actions
        .iter()
        .map(|a| {
            Direction::from_token(&Direction::token_for_action(a))
                .unwrap_or(Direction::Global)
                .token()
        })
        .collect();

    format!(
        "{day}|{}|{}",
        periods.into_iter().collect::<Vec<_>>().join(","),
        directions.into_iter().collect::<Vec<_>>().join(","),
    )
}

impl ActiveFilters {
    pub fn signature(&self) -> String {
        compute_signature(self.day.as_deref(), &self.time_periods, &self.actions)
    }
}

/// Outcome of a [`FilterCache::resolve`] call.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub signature: String,
    pub ids: BTreeSet<MetricId>,
    pub records: Arc<StatMap>,
    pub from_cache: bool,
}

// ---------------------------------------------------------------------------
// FilterCache
// ---------------------------------------------------------------------------

/// Signature-keyed cache in front of a stats source.
///
/// At most one fetch per signature for the lifetime of the cache: no TTL and
/// no eviction. Failed fetches store nothing, so the same filters retry.
/// Entries are immutable snapshots; readers see a complete map or none.
/// [`FilterCache::clear`] starts a new generation: fetches already running
/// when it is called still return their records but never store them.
pub struct FilterCache<F> {
    fetcher: F,
    tracked: Vec<MetricType>,
    /// signature → records for exactly the identifiers requested under it
    entries: DashMap<String, Arc<StatMap>>,
    /// signature → gate serializing fetches for that signature
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    generation: AtomicU64,
    fetches: AtomicU64,
    latency: Arc<LatencyStats>,
}

impl<F: RecordFetcher> FilterCache<F> {
    /// Cache over the four charted metric types.
    pub fn new(fetcher: F, latency: Arc<LatencyStats>) -> Self {
        Self::with_tracked(fetcher, MetricType::CHARTED.to_vec(), latency)
    }

    pub fn with_tracked(fetcher: F, tracked: Vec<MetricType>, latency: Arc<LatencyStats>) -> Self {
        Self {
            fetcher,
            tracked,
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            generation: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            latency,
        }
    }

    pub async fn resolve(&self, filters: &ActiveFilters) -> Result<Resolved> {
        let ids = filters.expand(&self.tracked);
        let signature = filters.signature();

        if let Some(records) = self.get(&signature) {
            debug!(signature = %signature, "cache hit");
            return Ok(Resolved { signature, ids, records, from_cache: true });
        }

        let gate = self.in_flight.entry(signature.clone()).or_default().value().clone();
        let result = self.fetch_gated(&gate, signature.clone(), ids).await;
        drop(gate);
        // Gates still held or awaited by other callers stay in place.
        self.in_flight.remove_if(&signature, |_, g| Arc::strong_count(g) == 1);
        result
    }

    async fn fetch_gated(
        &self,
        gate: &tokio::sync::Mutex<()>,
        signature: String,
        ids: BTreeSet<MetricId>,
    ) -> Result<Resolved> {
        let _guard = gate.lock().await;

        // Another caller may have filled the entry while we waited.
        if let Some(records) = self.get(&signature) {
            debug!(signature = %signature, "cache filled while waiting");
            return Ok(Resolved { signature, ids, records, from_cache: true });
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let id_list: Vec<MetricId> = ids.iter().copied().collect();
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = self.fetcher.fetch_records(&id_list).await;
        self.latency.record(started.elapsed());

        match result {
            Ok(mut records) => {
                records.retain(|id, _| ids.contains(id));
                let records = Arc::new(records);
                if self.store(&signature, &records, generation) {
                    info!(
                        signature = %signature,
                        requested = ids.len(),
                        found = records.len(),
                        "cached stats for filters"
                    );
                } else {
                    warn!(signature = %signature, "cache cleared during fetch, result not stored");
                }
                Ok(Resolved { signature, ids, records, from_cache: false })
            }
            Err(e) => {
                error!(signature = %signature, "Stats fetch failed: {e}");
                Err(e)
            }
        }
    }

    /// Insert unless a clear happened since `generation` was read.
    fn store(&self, signature: &str, records: &Arc<StatMap>, generation: u64) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        self.entries.insert(signature.to_string(), Arc::clone(records));
        // clear() bumps the generation before emptying, so a clear racing the
        // insert above is caught here.
        if self.generation.load(Ordering::SeqCst) != generation {
            self.entries.remove_if(signature, |_, v| Arc::ptr_eq(v, records));
            return false;
        }
        true
    }

    pub fn get(&self, signature: &str) -> Option<Arc<StatMap>> {
        self.entries.get(signature).map(|r| Arc::clone(r.value()))
    }

    /// Drop every entry, e.g. on logout. Gates for running fetches are kept
    /// so a signature never has two fetches in flight.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of calls made to the stats source.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::testing::CountingFetcher;

    fn cache(fetcher: CountingFetcher) -> FilterCache<CountingFetcher> {
        FilterCache::new(fetcher, Arc::new(LatencyStats::new()))
    }

    fn filters(day: Option<&str>, times: &[&str], actions: &[&str]) -> ActiveFilters {
        ActiveFilters {
            day: day.map(str::to_string),
            time_periods: times.iter().map(|s| s.to_string()).collect(),
            actions: actions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn signature_is_order_insensitive() {
        let a = filters(Some("Monday"), &["10:40-10:50", "10:30-10:40"], &["Long"]).signature();
        let b = filters(Some("monday"), &["10:30-10:40", "10:40-10:50"], &["long"]).signature();
        assert_eq!(a, b);
        assert_eq!(a, "monday|10:30-10:40,10:40-10:50|long");
        assert_eq!(compute_signature(None, &[], &[]), "all||");
        assert_eq!(
            filters(None, &["11:00-11:10"], &["True", "Short", "False"]).signature(),
            "all|11:00-11:10|global,short"
        );
        assert_ne!(compute_signature(None, &[], &[]), compute_signature(Some("monday"), &[], &[]));
    }

    #[tokio::test]
    async fn delimiters_inside_tokens_do_not_alias_signatures() {
        let cache = cache(CountingFetcher::new());
        let joined = filters(None, &["10:30-10:40,a"], &[]);
        let split = filters(None, &["10:30-10:40", "a"], &[]);
        assert_ne!(joined.signature(), split.signature());
        assert_eq!(joined.signature(), "all|global|");

        let one = cache.resolve(&joined).await.unwrap();
        let two = cache.resolve(&split).await.unwrap();
        assert_eq!(one.records.len(), 4);
        assert!(!two.from_cache);
        assert_eq!(two.ids.len(), 8);
        assert_eq!(two.records.len(), 8);
    }

    #[tokio::test]
    async fn unknown_tokens_share_the_global_entry() {
        let cache = cache(CountingFetcher::new());
        cache.resolve(&filters(None, &["whenever"], &["Sideways"])).await.unwrap();
        let again = cache.resolve(&filters(None, &["global"], &["global"])).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(cache.fetcher().calls(), 1);
    }

    #[tokio::test]
    async fn defaults_resolve_four_ids() {
        let cache = cache(CountingFetcher::new());
        let resolved = cache.resolve(&ActiveFilters::default()).await.unwrap();
        assert_eq!(resolved.ids.into_iter().collect::<Vec<_>>(), vec![22, 322, 472, 622]);
        assert_eq!(resolved.records.len(), 4);
        assert_eq!(cache.fetcher().requests(), vec![vec![22, 322, 472, 622]]);
    }

    #[tokio::test]
    async fn identical_filters_fetch_once() {
        let cache = cache(CountingFetcher::new());
        let f = filters(Some("tuesday"), &["10:30-10:40"], &["Long", "Short"]);

        let first = cache.resolve(&f).await.unwrap();
        let second = cache.resolve(&f).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(cache.fetch_count(), 1);
        assert_eq!(cache.fetcher().calls(), 1);
        assert!(Arc::ptr_eq(&first.records, &second.records));
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let cache = cache(CountingFetcher::new());
        let f = filters(None, &[], &[]);

        cache.fetcher().set_failing(true);
        assert!(cache.resolve(&f).await.is_err());
        assert!(cache.is_empty());

        cache.fetcher().set_failing(false);
        let resolved = cache.resolve(&f).await.unwrap();
        assert!(!resolved.from_cache);
        assert_eq!(cache.fetcher().calls(), 2);
    }

    #[tokio::test]
    async fn unrequested_records_are_dropped() {
        let fetcher = CountingFetcher::new().with_extra(999);
        let cache = cache(fetcher);
        let resolved = cache.resolve(&ActiveFilters::default()).await.unwrap();
        assert!(!resolved.records.contains_key(&999));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let cache = cache(CountingFetcher::new().with_delay(Duration::from_millis(30)));
        let f = filters(Some("friday"), &[], &[]);

        let (a, b) = tokio::join!(cache.resolve(&f), cache.resolve(&f));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(cache.fetcher().calls(), 1);
    }

    #[tokio::test]
    async fn clear_forces_refetch() {
        let cache = cache(CountingFetcher::new());
        let f = ActiveFilters::default();
        cache.resolve(&f).await.unwrap();
        cache.clear();
        assert!(cache.get(&f.signature()).is_none());
        cache.resolve(&f).await.unwrap();
        assert_eq!(cache.fetcher().calls(), 2);
    }

    #[tokio::test]
    async fn clear_during_fetch_discards_the_result() {
        let cache = cache(CountingFetcher::new().with_delay(Duration::from_millis(50)));
        let f = ActiveFilters::default();

        let (resolved, _) = tokio::join!(cache.resolve(&f), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.clear();
        });

        assert_eq!(resolved.unwrap().records.len(), 4);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn request_after_clear_waits_for_running_fetch() {
        let cache = cache(CountingFetcher::new().with_delay(Duration::from_millis(50)));
        let f = ActiveFilters::default();

        let (first, second) = tokio::join!(cache.resolve(&f), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.clear();
            cache.resolve(&f).await
        });

        assert!(!first.unwrap().from_cache);
        assert!(!second.unwrap().from_cache);
        assert_eq!(cache.fetcher().calls(), 2);
        assert_eq!(cache.fetcher().peak_in_flight(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.in_flight.is_empty());
    }
}
