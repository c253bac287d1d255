//! Shared infrastructure for building runner output.
//!
//! JSON map construction is verbose with raw `serde_json`; these helpers
//! keep runner bodies focused on the statistics. Non-finite numbers are
//! serialized as null so envelopes always round-trip.

use serde_json::{Map, Value};

use crate::result::JsonMap;

/// A finite number becomes a JSON number; anything else becomes null.
pub fn json_num(x: f64) -> Value {
    if x.is_finite() {
        serde_json::Number::from_f64(x).map_or(Value::Null, Value::Number)
    } else {
        Value::Null
    }
}

pub fn num(map: &mut JsonMap, key: &str, value: f64) {
    map.insert(key.to_string(), json_num(value));
}

pub fn opt_num(map: &mut JsonMap, key: &str, value: Option<f64>) {
    map.insert(key.to_string(), value.map_or(Value::Null, json_num));
}

pub fn int(map: &mut JsonMap, key: &str, value: usize) {
    map.insert(key.to_string(), Value::from(value as u64));
}

pub fn text(map: &mut JsonMap, key: &str, value: impl Into<String>) {
    map.insert(key.to_string(), Value::String(value.into()));
}

pub fn boolean(map: &mut JsonMap, key: &str, value: bool) {
    map.insert(key.to_string(), Value::Bool(value));
}

pub fn num_array(map: &mut JsonMap, key: &str, values: &[f64]) {
    map.insert(
        key.to_string(),
        Value::Array(values.iter().map(|&v| json_num(v)).collect()),
    );
}

pub fn str_array(map: &mut JsonMap, key: &str, values: &[String]) {
    map.insert(
        key.to_string(),
        Value::Array(values.iter().map(|v| Value::String(v.clone())).collect()),
    );
}

pub fn object(map: &mut JsonMap, key: &str, value: JsonMap) {
    map.insert(key.to_string(), Value::Object(value));
}

pub fn array(map: &mut JsonMap, key: &str, values: Vec<Value>) {
    map.insert(key.to_string(), Value::Array(values));
}

/// Fresh map built by a closure; shorthand for nested objects.
pub fn build(f: impl FnOnce(&mut JsonMap)) -> JsonMap {
    let mut map = Map::new();
    f(&mut map);
    map
}

/// Round to a fixed number of decimal places for display-stable output.
pub fn round(x: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (x * factor).round() / factor
}
