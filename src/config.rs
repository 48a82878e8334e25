use crate::error::{AppError, Result};

/// Width of the identifier band owned by each metric type.
pub const BAND_WIDTH: u32 = 150;

/// First identifier of each metric band. Bands are contiguous and never overlap.
pub mod band_base {
    pub const MAX_RETRACEMENT: u32 = 22;
    pub const TRUE_DAY_PERCENTAGE: u32 = 172;
    pub const MAX_EXTENSION_SD: u32 = 322;
    pub const MAX_RETRACEMENT_TIME: u32 = 472;
    pub const MAX_EXTENSION_TIME: u32 = 622;
}

/// Offset steps inside a band: weekday, intraday bucket, direction.
pub const DAY_STEP: u32 = 30;
pub const TIME_PERIOD_STEP: u32 = 3;
pub const DIRECTION_STEP: u32 = 1;

/// Decimal places used for numeric histogram labels.
pub const LABEL_DECIMALS: usize = 2;

/// Default request timeout for the remote stats source (seconds).
pub const REST_TIMEOUT_SECS: u64 = 30;

/// Where the dashboard reads computed statistics from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Sqlite,
    Rest,
    Mock,
}

impl std::str::FromStr for DataSource {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DataSource::Sqlite),
            "rest" => Ok(DataSource::Rest),
            "mock" => Ok(DataSource::Mock),
            other => Err(AppError::Config(format!(
                "DATA_SOURCE must be one of sqlite, rest, mock (got {other:?})"
            ))),
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataSource::Sqlite => "sqlite",
            DataSource::Rest => "rest",
            DataSource::Mock => "mock",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub data_source: DataSource,
    /// Base URL of a PostgREST-style endpoint exposing `computed_stats` (REST_URL)
    pub rest_url: Option<String>,
    /// Sent as both `apikey` and bearer token (REST_API_KEY)
    pub rest_api_key: Option<String>,
    pub rest_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_source = std::env::var("DATA_SOURCE")
            .unwrap_or_else(|_| "sqlite".to_string())
            .parse::<DataSource>()?;
        let rest_url = std::env::var("REST_URL")
            .ok()
            .map(|s| s.trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        if data_source == DataSource::Rest && rest_url.is_none() {
            return Err(AppError::Config(
                "REST_URL is required when DATA_SOURCE=rest".to_string(),
            ));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "stats.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            data_source,
            rest_url,
            rest_api_key: std::env::var("REST_API_KEY").ok().filter(|s| !s.is_empty()),
            rest_timeout_secs: std::env::var("REST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(REST_TIMEOUT_SECS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<DataSource>().unwrap(), DataSource::Sqlite);
        assert_eq!(" mock ".parse::<DataSource>().unwrap(), DataSource::Mock);
        assert!("postgres".parse::<DataSource>().is_err());
    }

    #[test]
    fn bands_do_not_overlap() {
        let mut bases = [
            band_base::MAX_RETRACEMENT,
            band_base::TRUE_DAY_PERCENTAGE,
            band_base::MAX_EXTENSION_SD,
            band_base::MAX_RETRACEMENT_TIME,
            band_base::MAX_EXTENSION_TIME,
        ];
        bases.sort_unstable();
        for pair in bases.windows(2) {
            assert_eq!(pair[1] - pair[0], BAND_WIDTH);
        }
    }
}
