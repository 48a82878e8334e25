use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{info, warn};

use crate::codec::{metric_ids_for_type, metric_title};
use crate::error::Result;
use crate::normalizer::normalize;
use crate::source::RecordFetcher;
use crate::state::filter_cache::{FilterCache, Resolved};
use crate::types::{ActiveFilters, MetricId, MetricType, Series, StatMap};

// ---------------------------------------------------------------------------
// View types handed to the chart renderer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartState {
    Ready { series: Series },
    /// No stored record for the identifier; rendered as a placeholder.
    NoData,
    /// A record exists but could not be normalized.
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartPanel {
    pub metric: MetricType,
    pub title: String,
    pub metric_id: MetricId,
    #[serde(flatten)]
    pub state: ChartState,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    /// Request sequence number that produced this view.
    pub seq: u64,
    pub signature: String,
    pub filters: ActiveFilters,
    pub selected_ids: Vec<MetricId>,
    pub charts: Vec<ChartPanel>,
    pub from_cache: bool,
    /// Dashboard-level error banner, set when the stats fetch failed.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Applied(Arc<DashboardView>),
    /// A newer request was issued before this one completed; its result was dropped.
    Superseded { seq: u64, latest: u64 },
}

// ---------------------------------------------------------------------------
// DashboardSession
// ---------------------------------------------------------------------------

/// One dashboard consumer: filter state, the signature cache, and the last
/// published view. Every filter change issues a new sequence number and only
/// the latest issued request may publish.
pub struct DashboardSession<F> {
    cache: FilterCache<F>,
    filters: RwLock<ActiveFilters>,
    issued: AtomicU64,
    view: RwLock<Option<Arc<DashboardView>>>,
}

impl<F: RecordFetcher> DashboardSession<F> {
    pub fn new(cache: FilterCache<F>) -> Self {
        Self {
            cache,
            filters: RwLock::new(ActiveFilters::default()),
            issued: AtomicU64::new(0),
            view: RwLock::new(None),
        }
    }

    pub fn cache(&self) -> &FilterCache<F> {
        &self.cache
    }

    pub fn filters(&self) -> ActiveFilters {
        read(&self.filters).clone()
    }

    pub fn current_view(&self) -> Option<Arc<DashboardView>> {
        read(&self.view).clone()
    }

    pub fn latest_seq(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub async fn apply(&self, filters: ActiveFilters) -> Result<ApplyOutcome> {
        self.update(|f| *f = filters).await
    }

    pub async fn set_day(&self, day: Option<String>) -> Result<ApplyOutcome> {
        self.update(|f| f.day = day).await
    }

    pub async fn toggle_time_period(&self, token: &str) -> Result<ApplyOutcome> {
        self.update(|f| toggle(&mut f.time_periods, token)).await
    }

    pub async fn toggle_action(&self, token: &str) -> Result<ApplyOutcome> {
        self.update(|f| toggle(&mut f.actions, token)).await
    }

    pub async fn clear_filters(&self) -> Result<ApplyOutcome> {
        self.update(|f| *f = ActiveFilters::default()).await
    }

    /// Re-issue the current filters; used after a failed fetch.
    pub async fn refresh(&self) -> Result<ApplyOutcome> {
        self.update(|_| {}).await
    }

    /// End of the dashboard session: cache, filters and view are discarded and
    /// any in-flight request is superseded.
    pub fn logout(&self) {
        let mut filters = write(&self.filters);
        self.issued.fetch_add(1, Ordering::SeqCst);
        *filters = ActiveFilters::default();
        *write(&self.view) = None;
        self.cache.clear();
        info!("Session cleared");
    }

    async fn update(&self, change: impl FnOnce(&mut ActiveFilters)) -> Result<ApplyOutcome> {
        // Sequence numbers are taken under the filters lock so that issue order
        // and filter order agree.
        let (seq, filters) = {
            let mut guard = write(&self.filters);
            change(&mut guard);
            let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            (seq, guard.clone())
        };

        let resolved = self.cache.resolve(&filters).await;

        let mut view = write(&self.view);
        let latest = self.issued.load(Ordering::SeqCst);
        if seq != latest {
            warn!(seq, latest, "dropping superseded dashboard request");
            return Ok(ApplyOutcome::Superseded { seq, latest });
        }

        match resolved {
            Ok(resolved) => {
                let published = Arc::new(build_view(seq, filters, &resolved));
                *view = Some(Arc::clone(&published));
                Ok(ApplyOutcome::Applied(published))
            }
            Err(e) => {
                let signature = filters.signature();
                let charts = build_charts(&filters, &StatMap::new());
                *view = Some(Arc::new(DashboardView {
                    seq,
                    signature,
                    filters,
                    selected_ids: Vec::new(),
                    charts,
                    from_cache: false,
                    error: Some(format!("Failed to load metrics: {e}")),
                }));
                Err(e)
            }
        }
    }
}

fn build_view(seq: u64, filters: ActiveFilters, resolved: &Resolved) -> DashboardView {
    let charts = build_charts(&filters, &resolved.records);
    DashboardView {
        seq,
        signature: resolved.signature.clone(),
        filters,
        selected_ids: resolved.ids.iter().copied().collect(),
        charts,
        from_cache: resolved.from_cache,
        error: None,
    }
}

/// One panel per charted type, showing the first identifier the filters select.
pub fn build_charts(filters: &ActiveFilters, records: &StatMap) -> Vec<ChartPanel> {
    MetricType::CHARTED
        .into_iter()
        .filter_map(|metric| {
            let metric_id = *metric_ids_for_type(filters, metric).first()?;
            let title = metric_title(metric_id);
            let state = match records.get(&metric_id) {
                None => ChartState::NoData,
                Some(record) => match normalize(record) {
                    Some(series) => ChartState::Ready { series },
                    None => ChartState::Error {
                        message: format!("Cannot render {title} (metric {metric_id})"),
                    },
                },
            };
            Some(ChartPanel { metric, title, metric_id, state })
        })
        .collect()
}

fn toggle(list: &mut Vec<String>, token: &str) {
    if let Some(pos) = list.iter().position(|t| t == token) {
        list.remove(pos);
    } else {
        list.push(token.to_string());
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
