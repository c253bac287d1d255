//! The standardized analysis result envelope.
//!
//! Every runner produces a `RawTestOutput`; the dispatcher wraps it (or the
//! runner's error) into an `AnalysisResult`. Envelopes are plain data and
//! immutable once produced; re-running a test yields a new envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::charts::ChartSpec;

pub type JsonMap = Map<String, Value>;

/// Category a test belongs to; drives chart conventions and CLI grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    Descriptive,
    Comparison,
    Regression,
    ProcessControl,
    Capability,
    FactorialDesign,
}

impl TestCategory {
    pub fn name(self) -> &'static str {
        match self {
            Self::Descriptive => "descriptive",
            Self::Comparison => "comparison",
            Self::Regression => "regression",
            Self::ProcessControl => "process_control",
            Self::Capability => "capability",
            Self::FactorialDesign => "factorial_design",
        }
    }

    /// Whether results in this category conventionally carry charts.
    pub fn expects_charts(self) -> bool {
        !matches!(self, Self::FactorialDesign)
    }
}

impl std::fmt::Display for TestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a runner hands back on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTestOutput {
    pub summary: JsonMap,
    pub details: JsonMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<ChartSpec>,
    pub interpretation_context: JsonMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RawTestOutput {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// The finished envelope consumers receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub test_id: String,
    pub category: TestCategory,
    pub success: bool,
    pub summary: JsonMap,
    pub details: JsonMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<ChartSpec>,
    pub interpretation_context: JsonMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp_ms: u64,
}

impl AnalysisResult {
    pub fn succeeded(
        test_id: &str,
        category: TestCategory,
        output: RawTestOutput,
        duration_ms: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            test_id: test_id.to_string(),
            category,
            success: true,
            summary: output.summary,
            details: output.details,
            charts: output.charts,
            interpretation_context: output.interpretation_context,
            warnings: output.warnings,
            error: None,
            duration_ms,
            timestamp_ms,
        }
    }

    pub fn failed(
        test_id: &str,
        category: TestCategory,
        error: String,
        duration_ms: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            test_id: test_id.to_string(),
            category,
            success: false,
            summary: JsonMap::new(),
            details: JsonMap::new(),
            charts: Vec::new(),
            interpretation_context: JsonMap::new(),
            warnings: Vec::new(),
            error: Some(error),
            duration_ms,
            timestamp_ms,
        }
    }

    /// Numeric summary field, if present and numeric.
    pub fn summary_number(&self, key: &str) -> Option<f64> {
        self.summary.get(key).and_then(Value::as_f64)
    }
}
