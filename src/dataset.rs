//! Immutable dataset snapshots.
//!
//! A `Dataset` is a read-only tabular view built from JSON record arrays
//! (the shape dataset previews arrive in). Columns carry a semantic type
//! inferred at ingestion and overridable per column. All numeric accessors
//! drop missing and non-finite cells, so runners never see NaN.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::EngineError;

/// Semantic role of a column, used for catalog role matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Continuous,
    Categorical,
    Ordinal,
    Count,
}

impl SemanticType {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Continuous | Self::Count | Self::Ordinal)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Categorical => "categorical",
            Self::Ordinal => "ordinal",
            Self::Count => "count",
        }
    }
}

/// A single cell. Missing covers JSON null, absent keys, and non-finite numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Number(n) => match n.as_f64() {
                Some(x) if x.is_finite() => Self::Number(x),
                _ => Self::Missing,
            },
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::String(s) if s.trim().is_empty() => Self::Missing,
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub semantic: SemanticType,
    values: Vec<CellValue>,
}

impl Column {
    /// Fraction of cells that are missing.
    pub fn missing_fraction(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let missing = self
            .values
            .iter()
            .filter(|v| matches!(v, CellValue::Missing))
            .count();
        missing as f64 / self.values.len() as f64
    }
}

/// Immutable snapshot of tabular data.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

/// Shape summary used by catalog applicability predicates.
#[derive(Debug, Clone)]
pub struct DatasetProfile {
    pub rows: usize,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl Dataset {
    /// Builds a dataset from a JSON array of record objects.
    ///
    /// The column set is the union of keys across records; a record missing a
    /// key contributes a missing cell. Semantic types are inferred: all-numeric
    /// columns are continuous (count when every value is a non-negative
    /// integer), everything else is categorical.
    pub fn from_records(records: &[Value]) -> Result<Self, EngineError> {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            let obj = record.as_object().ok_or_else(|| {
                EngineError::configuration("dataset records must be JSON objects")
            })?;
            for key in obj.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let values: Vec<CellValue> = records
                .iter()
                .map(|record| {
                    record
                        .get(&name)
                        .map(CellValue::from_json)
                        .unwrap_or(CellValue::Missing)
                })
                .collect();
            let semantic = infer_semantic(&values);
            columns.push(Column {
                name,
                semantic,
                values,
            });
        }

        Ok(Self {
            rows: records.len(),
            columns,
        })
    }

    /// Parses a JSON string holding a record array.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(json)?;
        let records = value.as_array().ok_or_else(|| {
            EngineError::configuration("dataset JSON must be an array of records")
        })?;
        Self::from_records(records)
    }

    /// Overrides the inferred semantic type of a column.
    pub fn with_semantic(mut self, name: &str, semantic: SemanticType) -> Self {
        if let Some(col) = self.columns.iter_mut().find(|c| c.name == name) {
            col.semantic = semantic;
        }
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Numeric view of a column with missing and non-numeric cells dropped.
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>, EngineError> {
        let col = self.require(name)?;
        Ok(col
            .values
            .iter()
            .filter_map(|v| match v {
                CellValue::Number(x) => Some(*x),
                _ => None,
            })
            .collect())
    }

    /// Text labels of a column with missing cells dropped. Numbers are
    /// rendered as labels so count-typed columns can serve as categories.
    pub fn labels(&self, name: &str) -> Result<Vec<String>, EngineError> {
        let col = self.require(name)?;
        Ok(col
            .values
            .iter()
            .filter_map(|v| match v {
                CellValue::Text(s) => Some(s.clone()),
                CellValue::Number(x) => Some(format_label(*x)),
                CellValue::Missing => None,
            })
            .collect())
    }

    /// Numeric values of `value` keyed by the label in `group`, rows where
    /// either cell is missing excluded. Groups come back in label order.
    pub fn grouped(
        &self,
        value: &str,
        group: &str,
    ) -> Result<BTreeMap<String, Vec<f64>>, EngineError> {
        let value_col = self.require(value)?;
        let group_col = self.require(group)?;
        let mut out: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (v, g) in value_col.values.iter().zip(&group_col.values) {
            let (CellValue::Number(x), label) = (v, g) else {
                continue;
            };
            let key = match label {
                CellValue::Text(s) => s.clone(),
                CellValue::Number(n) => format_label(*n),
                CellValue::Missing => continue,
            };
            out.entry(key).or_default().push(*x);
        }
        Ok(out)
    }

    /// Row-aligned label pairs from two columns; rows with a missing cell on
    /// either side are excluded.
    pub fn label_pairs(&self, a: &str, b: &str) -> Result<Vec<(String, String)>, EngineError> {
        let col_a = self.require(a)?;
        let col_b = self.require(b)?;
        let mut out = Vec::new();
        for (va, vb) in col_a.values.iter().zip(&col_b.values) {
            let la = match va {
                CellValue::Text(s) => s.clone(),
                CellValue::Number(x) => format_label(*x),
                CellValue::Missing => continue,
            };
            let lb = match vb {
                CellValue::Text(s) => s.clone(),
                CellValue::Number(x) => format_label(*x),
                CellValue::Missing => continue,
            };
            out.push((la, lb));
        }
        Ok(out)
    }

    /// Row-aligned numeric pairs from two columns; rows with any missing or
    /// non-numeric cell are excluded from both sides.
    pub fn paired(&self, a: &str, b: &str) -> Result<(Vec<f64>, Vec<f64>), EngineError> {
        let col_a = self.require(a)?;
        let col_b = self.require(b)?;
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (va, vb) in col_a.values.iter().zip(&col_b.values) {
            if let (CellValue::Number(x), CellValue::Number(y)) = (va, vb) {
                xs.push(*x);
                ys.push(*y);
            }
        }
        Ok((xs, ys))
    }

    /// Row-aligned numeric matrix over several columns; a row survives only
    /// if every named column has a numeric cell there.
    pub fn matrix(&self, names: &[String]) -> Result<Vec<Vec<f64>>, EngineError> {
        let cols: Vec<&Column> = names
            .iter()
            .map(|n| self.require(n))
            .collect::<Result<_, _>>()?;
        let mut rows = Vec::new();
        for i in 0..self.rows {
            let mut row = Vec::with_capacity(cols.len());
            let mut complete = true;
            for col in &cols {
                match col.values.get(i) {
                    Some(CellValue::Number(x)) => row.push(*x),
                    _ => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Rows as (label, numeric values); a row survives only when the label
    /// and every numeric cell are present.
    pub fn rows_with_label(
        &self,
        label_col: &str,
        numeric_cols: &[&str],
    ) -> Result<Vec<(String, Vec<f64>)>, EngineError> {
        let labels = self.require(label_col)?;
        let cols: Vec<&Column> = numeric_cols
            .iter()
            .map(|n| self.require(n))
            .collect::<Result<_, _>>()?;
        let mut out = Vec::new();
        for i in 0..self.rows {
            let label = match labels.values.get(i) {
                Some(CellValue::Text(s)) => s.clone(),
                Some(CellValue::Number(x)) => format_label(*x),
                _ => continue,
            };
            let mut values = Vec::with_capacity(cols.len());
            let mut complete = true;
            for col in &cols {
                match col.values.get(i) {
                    Some(CellValue::Number(x)) => values.push(*x),
                    _ => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                out.push((label, values));
            }
        }
        Ok(out)
    }

    pub fn missing_fraction(&self, name: &str) -> Result<f64, EngineError> {
        Ok(self.require(name)?.missing_fraction())
    }

    pub fn profile(&self) -> DatasetProfile {
        let mut numeric_columns = Vec::new();
        let mut categorical_columns = Vec::new();
        for col in &self.columns {
            if col.semantic.is_numeric() {
                numeric_columns.push(col.name.clone());
            } else {
                categorical_columns.push(col.name.clone());
            }
        }
        DatasetProfile {
            rows: self.rows,
            numeric_columns,
            categorical_columns,
        }
    }

    fn require(&self, name: &str) -> Result<&Column, EngineError> {
        self.column(name).ok_or_else(|| {
            EngineError::configuration(format!("column '{name}' not found in dataset"))
        })
    }
}

fn infer_semantic(values: &[CellValue]) -> SemanticType {
    let mut saw_number = false;
    let mut all_count = true;
    for v in values {
        match v {
            CellValue::Number(x) => {
                saw_number = true;
                if *x < 0.0 || x.fract() != 0.0 {
                    all_count = false;
                }
            }
            CellValue::Text(_) => return SemanticType::Categorical,
            CellValue::Missing => {}
        }
    }
    if !saw_number {
        return SemanticType::Categorical;
    }
    if all_count {
        SemanticType::Count
    } else {
        SemanticType::Continuous
    }
}

fn format_label(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Dataset {
        let records = vec![
            json!({"weight": 10.5, "line": "A", "defects": 2}),
            json!({"weight": 11.0, "line": "B", "defects": 0}),
            json!({"weight": null, "line": "A", "defects": 1}),
            json!({"weight": 9.8, "line": "B", "defects": 3}),
        ];
        Dataset::from_records(&records).unwrap()
    }

    #[test]
    fn infers_semantic_types() {
        let ds = sample();
        assert_eq!(ds.column("weight").unwrap().semantic, SemanticType::Continuous);
        assert_eq!(ds.column("line").unwrap().semantic, SemanticType::Categorical);
        assert_eq!(ds.column("defects").unwrap().semantic, SemanticType::Count);
    }

    #[test]
    fn numeric_drops_missing_cells() {
        let ds = sample();
        assert_eq!(ds.numeric("weight").unwrap(), vec![10.5, 11.0, 9.8]);
        assert_eq!(ds.row_count(), 4);
    }

    #[test]
    fn grouped_excludes_rows_with_missing_values() {
        let ds = sample();
        let groups = ds.grouped("weight", "line").unwrap();
        assert_eq!(groups["A"], vec![10.5]);
        assert_eq!(groups["B"], vec![11.0, 9.8]);
    }

    #[test]
    fn missing_fraction_counts_nulls() {
        let ds = sample();
        assert!((ds.missing_fraction("weight").unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn unknown_column_is_a_configuration_error() {
        let ds = sample();
        let err = ds.numeric("mass").unwrap_err();
        assert!(err.to_string().contains("'mass'"));
    }

    #[test]
    fn paired_keeps_only_complete_rows() {
        let records = vec![
            json!({"a": 1.0, "b": 2.0}),
            json!({"a": null, "b": 3.0}),
            json!({"a": 4.0, "b": 5.0}),
        ];
        let ds = Dataset::from_records(&records).unwrap();
        let (xs, ys) = ds.paired("a", "b").unwrap();
        assert_eq!(xs, vec![1.0, 4.0]);
        assert_eq!(ys, vec![2.0, 5.0]);
    }
}
