/// Utility helpers shared by the catalog source and the collectors.
///
/// This module contains:
/// - Catalog ID normalization helpers
/// - Pacing delay computation
/// - Small JSON navigation helpers
///
/// IMPORTANT:
/// - No endpoint-specific logic should live here.
/// - Everything except `pacing_delay` must remain deterministic.
///

use std::time::Duration;

use rand::random_range;
use serde_json::{Map, Value};

/// Half-width of the jitter window around the pacing speed factor.
const PACING_JITTER_SECS: f64 = 0.02;

/// Returns the pause applied after every catalog request.
///
/// The delay is uniform over
///     [speed_factor - 0.02, speed_factor + 0.02]
/// seconds, clamped at zero. A non-finite factor means no pacing;
/// a factor too large for `Duration` saturates.
///
pub fn pacing_delay(speed_factor: f64) -> Duration {
    if !speed_factor.is_finite() {
        return Duration::ZERO;
    }
    let low = (speed_factor - PACING_JITTER_SECS).max(0.0);
    let high = (speed_factor + PACING_JITTER_SECS).max(low);
    Duration::try_from_secs_f64(random_range(low..=high)).unwrap_or(Duration::MAX)
}

/// Convert a search result ID into a project ID.
///
/// Examples:
/// - "project_1234" -> Some("1234")
/// - "market_unit_9" -> None
///
pub fn project_id_from_search(raw: &str) -> Option<String> {
    raw.strip_prefix("project_")
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Convert a search result ID into a market unit ID.
///
/// The search API returns IDs such as "market_unit_5521".
/// Anything not containing "market_unit" is not a listing.
///
pub fn market_unit_id_from_search(raw: &str) -> Option<String> {
    if !raw.contains("market_unit") {
        return None;
    }
    raw.strip_prefix("market_unit_")
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Walks `path` through nested objects.
///
/// Returns `None` as soon as a segment is missing or a value
/// along the way is not an object.
///
pub fn dig<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.as_object()?.get(*key))
}

/// `dig` that falls back to an empty object.
pub fn dig_object(value: &Value, path: &[&str]) -> Map<String, Value> {
    dig(value, path)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// `dig` that falls back to an empty array.
pub fn dig_array(value: &Value, path: &[&str]) -> Vec<Value> {
    dig(value, path)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Reads an entity ID that may be encoded as a string or a number.
pub fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// True for `null`, `{}`, `[]` and `""`.
///
/// The catalog uses all four to mean "no data".
pub fn is_empty_json(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
