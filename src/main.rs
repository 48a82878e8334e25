mod api;
mod codec;
mod config;
mod db;
mod error;
mod normalizer;
mod source;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{Config, DataSource};
use crate::db::writer::{open_pool, seed_mock_data};
use crate::db::StatReader;
use crate::error::Result;
use crate::source::{MockStats, RestStats, StatSource};
use crate::state::{DashboardSession, FilterCache};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Stats source ---
    let source = match cfg.data_source {
        DataSource::Sqlite => {
            let pool = open_pool(&cfg.db_path).await?;
            let reader = StatReader::new(pool.clone());
            let rows = reader.row_count().await?;
            if rows == 0 {
                warn!("computed_stats is empty at {}; seeding mock data", cfg.db_path);
                seed_mock_data(&pool).await?;
            }
            info!("Database ready at {} ({rows} stat rows)", cfg.db_path);
            StatSource::Sqlite(reader)
        }
        DataSource::Rest => {
            let rest = RestStats::new(&cfg)?;
            info!("Reading stats from {}", cfg.rest_url.as_deref().unwrap_or_default());
            StatSource::Rest(rest)
        }
        DataSource::Mock => {
            info!("Serving mock stats");
            StatSource::Mock(MockStats::new())
        }
    };

    // --- Session: filter cache + visible dashboard state ---
    let latency = Arc::new(LatencyStats::new());
    let cache = FilterCache::new(source, Arc::clone(&latency));
    let session = Arc::new(DashboardSession::new(cache));

    // Warm the default view so the first page load is a cache hit.
    if let Err(e) = session.refresh().await {
        warn!("Initial dashboard load failed: {e}");
    }

    // --- HTTP API ---
    let api_state = ApiState {
        session,
        latency,
        health: Arc::new(HealthState::new(cfg.data_source)),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
