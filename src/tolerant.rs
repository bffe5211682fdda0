// src/tolerant.rs

//! Lenient JSON helpers shared by the command protocol and the cleanup
//! target loader.
//!
//! Producers of both documents are not consistent about property casing
//! (`Id` / `id` / `ID`), so objects are normalised before typed
//! deserialization instead of spreading `#[serde(alias)]` everywhere.

use serde_json::{Map, Value};

/// Recursively lowercase every object key.
///
/// Values are left untouched. When two keys fold to the same name, the one
/// that appears last wins.
pub fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut folded = Map::with_capacity(map.len());
            for (k, v) in map {
                folded.insert(k.to_lowercase(), fold_keys(v));
            }
            Value::Object(folded)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(fold_keys).collect()),
        other => other,
    }
}

/// Look up `key` in a JSON object ignoring ASCII case.
pub fn get_ci<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}
