use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{HealthResponse, HealthState};
use crate::api::latency::LatencyStats;
use crate::codec::metric_title;
use crate::error::AppError;
use crate::normalizer::normalize;
use crate::source::{RecordFetcher, StatSource};
use crate::state::{ApplyOutcome, ChartState, DashboardSession};
use crate::types::{ActiveFilters, MetricId};

#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<DashboardSession<StatSource>>,
    pub latency: Arc<LatencyStats>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/dashboard", get(get_dashboard))
        .route("/filters", put(put_filters))
        .route("/filters/day", post(post_day))
        .route("/filters/time", post(post_toggle_time))
        .route("/filters/action", post(post_toggle_action))
        .route("/filters/clear", post(post_clear_filters))
        .route("/logout", post(post_logout))
        .route("/metrics/:id/series", get(get_metric_series))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct DayBody {
    pub day: Option<String>,
}

#[derive(Deserialize)]
pub struct ToggleBody {
    pub token: String,
}

#[derive(Serialize)]
pub struct SupersededResponse {
    pub superseded: u64,
    pub latest: u64,
}

#[derive(Serialize)]
pub struct MetricSeriesResponse {
    pub metric_id: MetricId,
    pub title: String,
    #[serde(flatten)]
    pub state: ChartState,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

fn outcome_response(outcome: ApplyOutcome) -> Response {
    match outcome {
        ApplyOutcome::Applied(view) => Json(view.as_ref()).into_response(),
        ApplyOutcome::Superseded { seq, latest } => (
            StatusCode::CONFLICT,
            Json(SupersededResponse { superseded: seq, latest }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let cache = state.session.cache();
    Json(HealthResponse {
        status: "ok",
        data_source: state.health.data_source.to_string(),
        uptime_secs: state.health.uptime_secs(),
        cached_signatures: cache.len(),
        fetches: cache.fetch_count(),
        latest_seq: state.session.latest_seq(),
    })
}

/// Last published view; the first call loads the default filters.
async fn get_dashboard(State(state): State<ApiState>) -> Result<Response, AppError> {
    match state.session.current_view() {
        Some(view) => Ok(Json(view.as_ref()).into_response()),
        None => Ok(outcome_response(state.session.refresh().await?)),
    }
}

async fn put_filters(
    State(state): State<ApiState>,
    Json(filters): Json<ActiveFilters>,
) -> Result<Response, AppError> {
    Ok(outcome_response(state.session.apply(filters).await?))
}

async fn post_day(
    State(state): State<ApiState>,
    Json(body): Json<DayBody>,
) -> Result<Response, AppError> {
    Ok(outcome_response(state.session.set_day(body.day).await?))
}

async fn post_toggle_time(
    State(state): State<ApiState>,
    Json(body): Json<ToggleBody>,
) -> Result<Response, AppError> {
    Ok(outcome_response(state.session.toggle_time_period(&body.token).await?))
}

async fn post_toggle_action(
    State(state): State<ApiState>,
    Json(body): Json<ToggleBody>,
) -> Result<Response, AppError> {
    Ok(outcome_response(state.session.toggle_action(&body.token).await?))
}

async fn post_clear_filters(State(state): State<ApiState>) -> Result<Response, AppError> {
    Ok(outcome_response(state.session.clear_filters().await?))
}

async fn post_logout(State(state): State<ApiState>) -> StatusCode {
    state.session.logout();
    StatusCode::NO_CONTENT
}

/// Single-metric lookup straight from the stats source, bypassing the filter cache.
async fn get_metric_series(
    State(state): State<ApiState>,
    Path(metric_id): Path<MetricId>,
) -> Result<Json<MetricSeriesResponse>, AppError> {
    let records = state.session.cache().fetcher().fetch_records(&[metric_id]).await?;
    let title = metric_title(metric_id);
    let chart_state = match records.get(&metric_id) {
        None => ChartState::NoData,
        Some(record) => match normalize(record) {
            Some(series) => ChartState::Ready { series },
            None => ChartState::Error {
                message: format!("Cannot render {title} (metric {metric_id})"),
            },
        },
    };
    Ok(Json(MetricSeriesResponse { metric_id, title, state: chart_state }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50_us, p95_us, p99_us) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_us,
        p95_us,
        p99_us,
    })
}
