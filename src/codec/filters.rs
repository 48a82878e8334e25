use std::collections::BTreeSet;

use crate::codec::encode;
use crate::types::{ActiveFilters, Direction, MetricId, MetricType};

const DEFAULT_DAY: &str = "monday";
const GLOBAL: &str = "global";

/// Expand multi-select filter state into the identifiers that must be fetched.
///
/// Cross product of day × time periods × directions × metric types, where an
/// unset day means Monday, no time periods means global, and no actions means
/// global. Actions are mapped onto directions first.
pub fn expand_filter_ids_for_types(
    day: Option<&str>,
    time_periods: &[String],
    actions: &[String],
    metric_types: &[MetricType],
) -> BTreeSet<MetricId> {
    let day = day.unwrap_or(DEFAULT_DAY);
    let periods = time_period_tokens(time_periods);
    let directions = direction_tokens(actions);

    let mut ids = BTreeSet::new();
    for period in &periods {
        for direction in &directions {
            for &metric in metric_types {
                ids.insert(encode(metric, day, period, direction));
            }
        }
    }
    ids
}

/// Identifiers for one metric type, in filter order with duplicates removed.
/// The first entry is the one a single chart displays.
pub fn metric_ids_for_type(filters: &ActiveFilters, metric: MetricType) -> Vec<MetricId> {
    let day = filters.day.as_deref().unwrap_or(DEFAULT_DAY);
    let mut ids = Vec::new();
    for period in time_period_tokens(&filters.time_periods) {
        for direction in direction_tokens(&filters.actions) {
            let id = encode(metric, day, &period, &direction);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

impl ActiveFilters {
    pub fn expand(&self, metric_types: &[MetricType]) -> BTreeSet<MetricId> {
        expand_filter_ids_for_types(
            self.day.as_deref(),
            &self.time_periods,
            &self.actions,
            metric_types,
        )
    }
}

fn time_period_tokens(time_periods: &[String]) -> Vec<String> {
    if time_periods.is_empty() {
        vec![GLOBAL.to_string()]
    } else {
        time_periods.to_vec()
    }
}

fn direction_tokens(actions: &[String]) -> Vec<String> {
    if actions.is_empty() {
        vec![GLOBAL.to_string()]
    } else {
        actions.iter().map(|a| Direction::token_for_action(a)).collect()
    }
}
