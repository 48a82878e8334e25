//! Decoding of stored statistic values into a tagged payload.
//!
//! Stored values come in a few shapes: a JSON array of `{bin, count}` objects,
//! a JSON object of parallel `bins`/`counts` arrays (time metrics only), a bare
//! number, or occasionally a plain numeric array. The JSON is usually wrapped
//! in a string. Shape sniffing happens once here; everything downstream
//! matches on [`StatPayload`].

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum StatPayload {
    Scalar(f64),
    Histogram(Vec<HistogramBin>),
    TimeSeries { bins: Vec<String>, counts: Vec<f64> },
    Values(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub bin: BinKey,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinKey {
    /// `[lo, hi]`
    Range(f64, f64),
    /// Bin midpoint.
    Point(f64),
    Label(String),
}

#[derive(Deserialize)]
struct TimeBins {
    bins: Vec<String>,
    counts: Vec<f64>,
}

impl StatPayload {
    /// Decode a raw stored value. `time_based` enables the `{bins, counts}` shape.
    /// Returns None for malformed JSON and unrecognized shapes.
    pub fn decode(raw: &Value, time_based: bool) -> Option<Self> {
        let value = parse_raw(raw)?;
        let value = value.as_ref();

        if time_based {
            if let Some(series) = time_bins(value) {
                return Some(series);
            }
        }

        match value {
            Value::Array(items) if looks_like_histogram(items) => {
                items.iter().map(histogram_bin).collect::<Option<Vec<_>>>().map(StatPayload::Histogram)
            }
            Value::Number(n) => n.as_f64().map(StatPayload::Scalar),
            Value::Array(items) => items.iter().map(coerce_number).collect::<Option<Vec<_>>>().map(StatPayload::Values),
            _ => None,
        }
    }
}

/// Unwrap string-encoded JSON. Non-JSON strings are accepted only if numeric.
fn parse_raw(raw: &Value) -> Option<Cow<'_, Value>> {
    match raw {
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with('[') || s.starts_with('{') {
                match serde_json::from_str::<Value>(s) {
                    Ok(v) => Some(Cow::Owned(v)),
                    Err(e) => {
                        warn!("Failed to parse stat value as JSON: {e}");
                        None
                    }
                }
            } else {
                s.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| Cow::Owned(Value::from(v)))
            }
        }
        Value::Null => None,
        other => Some(Cow::Borrowed(other)),
    }
}

fn time_bins(value: &Value) -> Option<StatPayload> {
    let TimeBins { bins, counts } = TimeBins::deserialize(value).ok()?;
    if bins.len() != counts.len() {
        warn!(bins = bins.len(), counts = counts.len(), "time series bins/counts length mismatch");
        return None;
    }
    Some(StatPayload::TimeSeries { bins, counts })
}

fn looks_like_histogram(items: &[Value]) -> bool {
    items
        .first()
        .and_then(Value::as_object)
        .is_some_and(|o| o.contains_key("bin") && o.contains_key("count"))
}

fn histogram_bin(item: &Value) -> Option<HistogramBin> {
    let count = coerce_number(item.get("count")?)?;
    let bin = match item.get("bin")? {
        Value::Array(pair) => range(pair)?,
        Value::Number(n) => BinKey::Point(n.as_f64()?),
        Value::String(s) => {
            // "[lo, hi]" stored as text
            match serde_json::from_str::<Vec<Value>>(s) {
                Ok(pair) => range(&pair)?,
                Err(_) => BinKey::Label(s.clone()),
            }
        }
        _ => return None,
    };
    Some(HistogramBin { bin, count })
}

fn range(pair: &[Value]) -> Option<BinKey> {
    match pair {
        [lo, hi] => Some(BinKey::Range(coerce_number(lo)?, coerce_number(hi)?)),
        _ => None,
    }
}

fn coerce_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
