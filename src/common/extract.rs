//! Lookup of loosely shaped Garmin responses.
//!
//! Garmin endpoints report the same metric under different names and at
//! different depths depending on endpoint version and account region, so
//! fields are read by a list of candidate keys instead of a fixed path.
//!
//! Search order for a mapping:
//!
//! 1. each candidate in order: a number or string directly under the key is
//!    returned; a mapping or sequence under the key is searched with the
//!    same candidates before the next candidate is tried; `null` and
//!    booleans count as "no value here";
//! 2. otherwise every value of the mapping is searched in document order.
//!
//! Sequences are searched element by element. A scalar is only ever returned
//! when it sits directly under a candidate key.

use serde_json::Value;

/// Returns the first number or string found under any of `candidates`.
///
/// `None` means the structure holds no candidate with a usable value; a
/// stored `0` or `""` is returned as found.
pub fn extract<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            for key in candidates {
                match map.get(*key) {
                    Some(found @ (Value::Number(_) | Value::String(_))) => return Some(found),
                    Some(nested @ (Value::Object(_) | Value::Array(_))) => {
                        if let Some(found) = extract(nested, candidates) {
                            return Some(found);
                        }
                    }
                    _ => {}
                }
            }
            map.values().find_map(|nested| extract(nested, candidates))
        }
        Value::Array(items) => items.iter().find_map(|item| extract(item, candidates)),
        _ => None,
    }
}

/// Returns the first non-null value of any shape stored under one of
/// `candidates`, using the same traversal as [`extract`].
///
/// Used to narrow a search to a sub-document before extracting a generic
/// key such as `value`.
pub fn extract_node<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    match value {
        Value::Object(map) => candidates
            .iter()
            .find_map(|key| map.get(*key).filter(|found| !found.is_null()))
            .or_else(|| map.values().find_map(|nested| extract_node(nested, candidates))),
        Value::Array(items) => items.iter().find_map(|item| extract_node(item, candidates)),
        _ => None,
    }
}

/// Numeric form of [`extract`]. Numeric strings such as `"72.5"` are parsed.
pub fn extract_f64(value: &Value, candidates: &[&str]) -> Option<f64> {
    match extract(value, candidates)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn extract_i64(value: &Value, candidates: &[&str]) -> Option<i64> {
    match extract(value, candidates)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form of [`extract`]. Numbers are rendered with their JSON spelling,
/// which keeps large integer ids intact.
pub fn extract_str(value: &Value, candidates: &[&str]) -> Option<String> {
    match extract(value, candidates)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
