//! Typed access to per-request test configuration.
//!
//! Configurations arrive as JSON objects; `TestConfig` wraps the map and
//! offers checked accessors. Schema validation against the catalog happens
//! in the dispatcher before any runner sees the config.

use serde_json::{Map, Value};

use crate::errors::EngineError;

#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    fields: Map<String, Value>,
}

impl TestConfig {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            Value::Null => Ok(Self::default()),
            _ => Err(EngineError::configuration(
                "test configuration must be a JSON object",
            )),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn has(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(v) if !v.is_null())
    }

    /// Required string field (column names, labels).
    pub fn text(&self, field: &str) -> Result<&str, EngineError> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(field, "a string"))
    }

    pub fn text_opt(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Required list-of-strings field (column lists).
    pub fn text_list(&self, field: &str) -> Result<Vec<String>, EngineError> {
        let items = self
            .fields
            .get(field)
            .and_then(Value::as_array)
            .ok_or_else(|| missing(field, "an array of strings"))?;
        items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| missing(field, "an array of strings"))
            })
            .collect()
    }

    pub fn number(&self, field: &str) -> Result<f64, EngineError> {
        self.fields
            .get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(field, "a number"))
    }

    pub fn number_opt(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }

    pub fn number_or(&self, field: &str, default: f64) -> f64 {
        self.number_opt(field).unwrap_or(default)
    }

    pub fn integer_opt(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Value::as_i64)
    }

    pub fn usize_or(&self, field: &str, default: usize) -> usize {
        self.integer_opt(field)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(default)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

fn missing(field: &str, expected: &str) -> EngineError {
    EngineError::configuration(format!("field '{field}' must be {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(v: Value) -> TestConfig {
        TestConfig::from_value(v).unwrap()
    }

    #[test]
    fn typed_accessors_enforce_shape() {
        let cfg = config(json!({"column": "weight", "alpha": 0.05, "cols": ["a", "b"]}));
        assert_eq!(cfg.text("column").unwrap(), "weight");
        assert!((cfg.number("alpha").unwrap() - 0.05).abs() < 1e-12);
        assert_eq!(cfg.text_list("cols").unwrap(), vec!["a", "b"]);
        assert!(cfg.text("alpha").is_err());
    }

    #[test]
    fn defaults_apply_when_absent() {
        let cfg = config(json!({}));
        assert!((cfg.number_or("alpha", 0.05) - 0.05).abs() < 1e-12);
        assert_eq!(cfg.usize_or("subgroup_size", 1), 1);
    }

    #[test]
    fn non_object_config_is_rejected() {
        assert!(TestConfig::from_value(json!([1, 2])).is_err());
        assert!(TestConfig::from_value(Value::Null).is_ok());
    }
}
