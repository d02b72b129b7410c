//! Tolerant field extraction over the plain records crossing the page
//! boundary. Missing or mis-typed fields degrade to defaults; nothing here
//! panics on malformed input.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

pub(crate) fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Identifiers arrive either as a plain string or as an object carrying a
/// serialized form under `id`/`_serialized`.
pub(crate) fn id_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Object(map)) => map
            .get("_serialized")
            .or_else(|| map.get("id"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

pub(crate) fn bool_field(raw: &Value, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn i64_field(raw: &Value, key: &str) -> Option<i64> {
    raw.get(key).and_then(Value::as_i64)
}

pub(crate) fn u32_field(raw: &Value, key: &str) -> u32 {
    raw.get(key)
        .and_then(Value::as_u64)
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

/// Unix seconds to a UTC timestamp; out-of-range values degrade to `None`.
pub(crate) fn timestamp_field(raw: &Value, key: &str) -> Option<DateTime<Utc>> {
    i64_field(raw, key).and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

pub(crate) fn string_list_field(raw: &Value, key: &str) -> Vec<String> {
    raw.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_field_accepts_both_shapes() {
        let raw = json!({ "a": "plain@c", "b": { "_serialized": "obj@c" }, "c": 5 });
        assert_eq!(id_field(&raw, "a").as_deref(), Some("plain@c"));
        assert_eq!(id_field(&raw, "b").as_deref(), Some("obj@c"));
        assert_eq!(id_field(&raw, "c"), None);
        assert_eq!(id_field(&raw, "missing"), None);
    }

    #[test]
    fn mistyped_fields_degrade_to_defaults() {
        let raw = json!({ "flag": "yes", "count": "many" });
        assert!(!bool_field(&raw, "flag"));
        assert_eq!(u32_field(&raw, "count"), 0);
        assert_eq!(timestamp_field(&raw, "count"), None);
    }
}
