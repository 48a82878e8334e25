use tracing::debug;

use crate::config::BAND_WIDTH;
use crate::types::{Direction, MetricId, MetricKey, MetricType, TimePeriod, Weekday};

/// Encode a metric type and filter tokens into its identifier.
///
/// Tokens are matched case-insensitively. An unknown day, time period or
/// direction contributes an offset of 0 (Monday / global) instead of failing.
pub fn encode(metric: MetricType, day: &str, time_period: &str, direction: &str) -> MetricId {
    let day = Weekday::from_token(day).unwrap_or_else(|| {
        debug!(token = day, "unrecognized day token, using monday");
        Weekday::Monday
    });
    let time_period = TimePeriod::from_token(time_period).unwrap_or_else(|| {
        debug!(token = time_period, "unrecognized time period token, using global");
        TimePeriod::GLOBAL
    });
    let direction = Direction::from_token(direction).unwrap_or_else(|| {
        debug!(token = direction, "unrecognized direction token, using global");
        Direction::Global
    });

    MetricKey { metric, day, time_period, direction }.id()
}

/// Band lookup. `None` for identifiers outside every band.
pub fn decode(id: MetricId) -> Option<MetricType> {
    MetricType::ALL
        .into_iter()
        .find(|m| (m.band_base()..m.band_base() + BAND_WIDTH).contains(&id))
}

/// True only inside the Max Retracement Time and Max Extension Time bands.
pub fn is_time_based(id: MetricId) -> bool {
    decode(id).is_some_and(MetricType::is_time_based)
}

/// Display title for a chart showing `id`.
pub fn metric_title(id: MetricId) -> String {
    match decode(id) {
        Some(metric) => metric.to_string(),
        None => format!("Metric {id}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::types::TIME_PERIOD_TOKENS;

    #[test]
    fn known_band_starts() {
        assert_eq!(encode(MetricType::MaxRetracement, "monday", "global", "global"), 22);
        assert_eq!(encode(MetricType::TrueDayPercentage, "monday", "global", "global"), 172);
        assert_eq!(encode(MetricType::MaxExtensionSd, "Monday", "global", "long"), 323);
        assert_eq!(encode(MetricType::MaxRetracementTime, "monday", "global", "short"), 474);
        assert_eq!(encode(MetricType::MaxExtensionTime, "monday", "global", "global"), 622);
    }

    #[test]
    fn offsets_add_up() {
        // 22 + tuesday(30) + 10:30-10:40(3) + long(1)
        assert_eq!(encode(MetricType::MaxRetracement, "TUESDAY", "10:30-10:40", "Long"), 56);
        // last slot of the band: friday(120) + 11:50-12:00(27) + short(2)
        assert_eq!(encode(MetricType::MaxExtensionTime, "friday", "11:50-12:00", "short"), 771);
    }

    #[test]
    fn unknown_tokens_default_to_zero_offset() {
        let base = encode(MetricType::MaxRetracement, "wednesday", "global", "global");
        assert_eq!(encode(MetricType::MaxRetracement, "wednesday", "09:00-09:10", "sideways"), base);
        assert_eq!(encode(MetricType::MaxRetracement, "someday", "global", "global"), 22);
    }

    #[test]
    fn decode_inverts_encode_for_all_tuples() {
        let mut seen = HashSet::new();
        for metric in MetricType::ALL {
            for day in Weekday::ALL {
                for period in TIME_PERIOD_TOKENS {
                    for direction in Direction::ALL {
                        let id = encode(metric, day.token(), period, direction.token());
                        assert_eq!(decode(id), Some(metric), "id {id}");
                        assert!(seen.insert(id), "duplicate id {id}");
                    }
                }
            }
        }
        assert_eq!(seen.len(), 5 * 5 * 10 * 3);
    }

    #[test]
    fn decode_out_of_range_is_none() {
        assert_eq!(decode(0), None);
        assert_eq!(decode(21), None);
        assert_eq!(decode(772), None);
        assert_eq!(decode(171), Some(MetricType::MaxRetracement));
        assert_eq!(metric_title(900), "Metric 900");
        assert_eq!(metric_title(322), "Max Extension SD");
    }

    #[test]
    fn time_based_matches_bands() {
        for id in 0..900 {
            let expected = (472..=771).contains(&id);
            assert_eq!(is_time_based(id), expected, "id {id}");
        }
    }
}
