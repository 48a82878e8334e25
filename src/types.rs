use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{band_base, DAY_STEP, DIRECTION_STEP, TIME_PERIOD_STEP};

/// Numeric identifier of one metric instance (type + filter tuple).
pub type MetricId = u32;

/// Records returned by a stats source, keyed by identifier.
pub type StatMap = HashMap<MetricId, StatRecord>;

// ---------------------------------------------------------------------------
// Metric types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    MaxRetracement,
    TrueDayPercentage,
    MaxExtensionSd,
    MaxRetracementTime,
    MaxExtensionTime,
}

impl MetricType {
    /// Every type, in band order.
    pub const ALL: [MetricType; 5] = [
        MetricType::MaxRetracement,
        MetricType::TrueDayPercentage,
        MetricType::MaxExtensionSd,
        MetricType::MaxRetracementTime,
        MetricType::MaxExtensionTime,
    ];

    /// The four types charted on the dashboard, in panel order.
    pub const CHARTED: [MetricType; 4] = [
        MetricType::MaxRetracement,
        MetricType::MaxRetracementTime,
        MetricType::MaxExtensionSd,
        MetricType::MaxExtensionTime,
    ];

    pub fn band_base(self) -> MetricId {
        match self {
            MetricType::MaxRetracement => band_base::MAX_RETRACEMENT,
            MetricType::TrueDayPercentage => band_base::TRUE_DAY_PERCENTAGE,
            MetricType::MaxExtensionSd => band_base::MAX_EXTENSION_SD,
            MetricType::MaxRetracementTime => band_base::MAX_RETRACEMENT_TIME,
            MetricType::MaxExtensionTime => band_base::MAX_EXTENSION_TIME,
        }
    }

    pub fn is_time_based(self) -> bool {
        matches!(self, MetricType::MaxRetracementTime | MetricType::MaxExtensionTime)
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MetricType::MaxRetracement => "Max Retracement",
            MetricType::TrueDayPercentage => "True Day Percentage",
            MetricType::MaxExtensionSd => "Max Extension SD",
            MetricType::MaxRetracementTime => "Max Retracement Time",
            MetricType::MaxExtensionTime => "Max Extension Time",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Filter dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    /// Case-insensitive, surrounding whitespace ignored.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.token().eq_ignore_ascii_case(token))
    }

    pub fn token(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
        }
    }

    pub fn offset(self) -> MetricId {
        self as MetricId * DAY_STEP
    }
}

/// Tokens for the global period followed by the nine intraday buckets.
pub const TIME_PERIOD_TOKENS: [&str; 10] = [
    "global",
    "10:30-10:40",
    "10:40-10:50",
    "10:50-11:00",
    "11:00-11:10",
    "11:10-11:20",
    "11:20-11:30",
    "11:30-11:40",
    "11:40-11:50",
    "11:50-12:00",
];

/// Ordinal into [`TIME_PERIOD_TOKENS`]; 0 is the global period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimePeriod(u8);

impl TimePeriod {
    pub const GLOBAL: TimePeriod = TimePeriod(0);

    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        TIME_PERIOD_TOKENS
            .iter()
            .position(|t| t.eq_ignore_ascii_case(token))
            .map(|i| TimePeriod(i as u8))
    }

    pub fn token(self) -> &'static str {
        TIME_PERIOD_TOKENS[self.0 as usize]
    }

    pub fn offset(self) -> MetricId {
        MetricId::from(self.0) * TIME_PERIOD_STEP
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Global,
    Long,
    Short,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Global, Direction::Long, Direction::Short];

    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|d| d.token().eq_ignore_ascii_case(token))
    }

    /// Maps a filter-UI action onto a direction token. "True"/"False" are
    /// day-outcome actions with no direction of their own, so they read as global.
    /// Anything else passes through lowercased and is resolved later.
    pub fn token_for_action(action: &str) -> String {
        let action = action.trim().to_ascii_lowercase();
        match action.as_str() {
            "long" => "long".to_string(),
            "short" => "short".to_string(),
            "true" | "false" => "global".to_string(),
            _ => action,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Direction::Global => "global",
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    pub fn offset(self) -> MetricId {
        self as MetricId * DIRECTION_STEP
    }
}

/// One concrete metric instance: a type plus its filter tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricKey {
    pub metric: MetricType,
    pub day: Weekday,
    pub time_period: TimePeriod,
    pub direction: Direction,
}

impl MetricKey {
    pub fn id(&self) -> MetricId {
        self.metric.band_base()
            + self.day.offset()
            + self.time_period.offset()
            + self.direction.offset()
    }
}

/// Filter state as supplied by the filter UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFilters {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub time_periods: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Stored records and rendered series
// ---------------------------------------------------------------------------

/// A computed statistic as persisted. `stat_value` is usually a JSON document
/// encoded as a string, but sources may also hand back bare numbers or
/// already-decoded JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub metric_id: MetricId,
    #[serde(default)]
    pub computed_on: Option<String>,
    pub stat_value: serde_json::Value,
}

/// Canonical chart input. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub time_based: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_case_insensitively() {
        assert_eq!(Weekday::from_token(" FRIDAY "), Some(Weekday::Friday));
        assert_eq!(Direction::from_token("Short"), Some(Direction::Short));
        assert_eq!(TimePeriod::from_token("GLOBAL"), Some(TimePeriod::GLOBAL));
        assert_eq!(TimePeriod::from_token("11:50-12:00").map(|t| t.offset()), Some(27));
        assert!(Weekday::from_token("saturday").is_none());
    }

    #[test]
    fn offsets_follow_fixed_steps() {
        let days: Vec<_> = Weekday::ALL.iter().map(|d| d.offset()).collect();
        assert_eq!(days, vec![0, 30, 60, 90, 120]);
        let periods: Vec<_> = TIME_PERIOD_TOKENS
            .iter()
            .filter_map(|t| TimePeriod::from_token(t))
            .map(|t| t.offset())
            .collect();
        assert_eq!(periods, vec![0, 3, 6, 9, 12, 15, 18, 21, 24, 27]);
        let dirs: Vec<_> = Direction::ALL.iter().map(|d| d.offset()).collect();
        assert_eq!(dirs, vec![0, 1, 2]);
    }

    #[test]
    fn actions_map_onto_directions() {
        assert_eq!(Direction::token_for_action("Long"), "long");
        assert_eq!(Direction::token_for_action("Short"), "short");
        assert_eq!(Direction::token_for_action("True"), "global");
        assert_eq!(Direction::token_for_action("False"), "global");
        assert_eq!(Direction::token_for_action("Breakout"), "breakout");
    }
}
