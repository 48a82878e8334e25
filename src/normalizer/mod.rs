pub mod payload;

use tracing::warn;

use crate::codec::is_time_based;
use crate::config::LABEL_DECIMALS;
use crate::types::{Series, StatRecord};

pub use payload::{BinKey, StatPayload};

/// Convert a stored record into a renderable series.
///
/// Input order is display order; nothing is sorted. Returns None when the
/// stored value cannot be parsed or has no recognized shape, which callers
/// surface as a per-chart error.
pub fn normalize(record: &StatRecord) -> Option<Series> {
    let time_based = is_time_based(record.metric_id);
    let Some(payload) = StatPayload::decode(&record.stat_value, time_based) else {
        warn!(metric_id = record.metric_id, "unrenderable stat value");
        return None;
    };
    Some(series_from_payload(payload, time_based))
}

pub fn series_from_payload(payload: StatPayload, time_based: bool) -> Series {
    let (labels, values) = match payload {
        StatPayload::TimeSeries { bins, counts } => (bins, counts),
        StatPayload::Histogram(bins) => bins
            .into_iter()
            .map(|b| (bin_label(b.bin), b.count))
            .unzip(),
        StatPayload::Scalar(v) => (vec!["Value".to_string()], vec![v]),
        StatPayload::Values(values) => {
            let labels = (1..=values.len()).map(|i| format!("Item {i}")).collect();
            (labels, values)
        }
    };
    Series { labels, values, time_based }
}

/// Ranges are labelled by their lower bound.
fn bin_label(bin: BinKey) -> String {
    match bin {
        BinKey::Range(lo, _) => format_number(lo),
        BinKey::Point(v) => format_number(v),
        BinKey::Label(s) => s,
    }
}

fn format_number(v: f64) -> String {
    // adding 0.0 turns -0.0 into 0.0 so it never prints as "-0.00"
    format!("{:.*}", LABEL_DECIMALS, v + 0.0)
}
