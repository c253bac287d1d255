//! Deterministic post-execution validation.
//!
//! Runs after the dispatcher, before any reviewer: re-examines the inputs
//! the analysis consumed and the numbers it produced, and re-checks the
//! statistical assumptions the test's catalog entry declares. Every check
//! here is a pure computation over the envelope, the dataset, and the
//! config; validating the same result twice yields the same report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{AssumptionCheck, FieldKind, TestDefinition};
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::result::AnalysisResult;
use crate::stats;

// ============================================================================
// REPORT TYPES
// ============================================================================

/// Tunable thresholds; defaults match the shipped engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    /// Missing-value fraction above which a column draws a warning.
    pub missing_warn: f64,
    /// Variance inflation factor above which a predictor draws a warning.
    pub vif_threshold: f64,
    /// Warning count above which confidence drops to Low.
    pub warning_budget: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            missing_warn: 0.20,
            vif_threshold: 10.0,
            warning_budget: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Context worth surfacing; does not affect confidence.
    Info,
    /// The result is usable but deserves scrutiny.
    Warning,
    /// The result should not be trusted.
    Blocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Execution,
    InputData,
    OutputSanity,
    Assumption,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: FindingCategory,
    pub severity: Severity,
    pub message: String,
    /// Test id to reach for instead, when one is cataloged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// False when any blocking finding was raised.
    pub passed: bool,
    pub confidence: Confidence,
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    pub fn warnings(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }

    pub fn blocking(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Blocking)
            .count()
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

struct Collector {
    findings: Vec<Finding>,
    recommendations: Vec<String>,
}

impl Collector {
    fn new() -> Self {
        Self {
            findings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    fn push(
        &mut self,
        category: FindingCategory,
        severity: Severity,
        message: impl Into<String>,
        alternative: Option<&str>,
    ) {
        self.findings.push(Finding {
            category,
            severity,
            message: message.into(),
            alternative: alternative.map(str::to_string),
        });
        if let Some(alt) = alternative {
            self.recommend(format!("consider '{alt}' instead"));
        }
    }

    fn recommend(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.recommendations.contains(&note) {
            self.recommendations.push(note);
        }
    }

    fn warn(&mut self, category: FindingCategory, message: impl Into<String>) {
        self.push(category, Severity::Warning, message, None);
    }

    fn block(&mut self, category: FindingCategory, message: impl Into<String>) {
        self.push(category, Severity::Blocking, message, None);
    }

    fn into_report(self, limits: &ValidationLimits) -> ValidationReport {
        let blocking = self
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Blocking)
            .count();
        let warnings = self
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count();
        let confidence = if blocking > 0 || warnings > limits.warning_budget {
            Confidence::Low
        } else if warnings > 0 {
            Confidence::Medium
        } else {
            Confidence::High
        };
        ValidationReport {
            passed: blocking == 0,
            confidence,
            findings: self.findings,
            recommendations: self.recommendations,
        }
    }
}

/// Validates a finished analysis against its inputs and its catalog entry.
pub fn validate(
    result: &AnalysisResult,
    dataset: &Dataset,
    config: &TestConfig,
    definition: &TestDefinition,
    limits: &ValidationLimits,
) -> ValidationReport {
    let mut out = Collector::new();

    if !result.success {
        let detail = result.error.as_deref().unwrap_or("no error recorded");
        out.block(
            FindingCategory::Execution,
            format!("analysis did not complete: {detail}"),
        );
        return out.into_report(limits);
    }

    check_inputs(&mut out, dataset, config, definition, limits);
    check_outputs(&mut out, result, definition);
    check_assumptions(&mut out, dataset, config, definition, limits);

    out.into_report(limits)
}

// ----------------------------------------------------------------------------
// Input checks
// ----------------------------------------------------------------------------

fn configured_columns(config: &TestConfig, definition: &TestDefinition) -> Vec<String> {
    let mut names = Vec::new();
    for field in definition.fields {
        match field.kind {
            FieldKind::Column => {
                if let Some(name) = config.text_opt(field.name) {
                    names.push(name.to_string());
                }
            }
            FieldKind::ColumnList => {
                if let Some(Value::Array(items)) = config.get(field.name) {
                    for item in items {
                        if let Some(name) = item.as_str() {
                            names.push(name.to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    names
}

fn check_inputs(
    out: &mut Collector,
    dataset: &Dataset,
    config: &TestConfig,
    definition: &TestDefinition,
    limits: &ValidationLimits,
) {
    let rows = dataset.row_count();
    if rows < definition.min_samples {
        out.block(
            FindingCategory::InputData,
            format!(
                "{rows} rows is below the minimum of {} for '{}'",
                definition.min_samples, definition.id
            ),
        );
    } else if rows < definition.min_samples * 2 {
        out.warn(
            FindingCategory::InputData,
            format!(
                "{rows} rows barely clears the minimum of {}; estimates will be noisy",
                definition.min_samples
            ),
        );
    }

    for name in configured_columns(config, definition) {
        if !dataset.has_column(&name) {
            out.block(
                FindingCategory::InputData,
                format!("configured column '{name}' does not exist in the dataset"),
            );
            continue;
        }
        if let Ok(fraction) = dataset.missing_fraction(&name) {
            if fraction > limits.missing_warn {
                out.warn(
                    FindingCategory::InputData,
                    format!(
                        "column '{name}' is {:.0}% missing; results reflect the observed subset",
                        fraction * 100.0
                    ),
                );
            }
        }
    }

    if let Some(group_field) = definition.group_field {
        if let (Some(value_col), Some(group_col)) = (
            value_column(config, definition, group_field),
            config.text_opt(group_field),
        ) {
            if let Ok(groups) = dataset.grouped(&value_col, group_col) {
                for (label, values) in &groups {
                    if values.len() < definition.min_per_group {
                        out.push(
                            FindingCategory::InputData,
                            Severity::Blocking,
                            format!(
                                "group '{label}' has {} observations; '{}' needs {} per group",
                                values.len(),
                                definition.id,
                                definition.min_per_group
                            ),
                            None,
                        );
                    }
                }
            }
        }
    }
}

/// The numeric column a grouped test operates on.
fn value_column(
    config: &TestConfig,
    definition: &TestDefinition,
    group_field: &str,
) -> Option<String> {
    definition
        .fields
        .iter()
        .find(|f| f.kind == FieldKind::Column && f.name != group_field && !f.accepts.is_empty())
        .and_then(|f| config.text_opt(f.name))
        .map(str::to_string)
}

// ----------------------------------------------------------------------------
// Output sanity checks
// ----------------------------------------------------------------------------

fn check_outputs(out: &mut Collector, result: &AnalysisResult, definition: &TestDefinition) {
    if let Some(p) = result.summary_number("p_value") {
        if !(0.0..=1.0).contains(&p) {
            out.block(
                FindingCategory::OutputSanity,
                format!("p-value {p} falls outside [0, 1]"),
            );
        }
    }
    if let Some(r2) = result.summary_number("r_squared") {
        if !(0.0..=1.0).contains(&r2) {
            out.block(
                FindingCategory::OutputSanity,
                format!("R-squared {r2} falls outside [0, 1]"),
            );
        }
    }
    if let Some(df) = result.summary_number("df") {
        if df <= 0.0 {
            out.block(
                FindingCategory::OutputSanity,
                format!("degrees of freedom {df} is not positive"),
            );
        }
    }
    check_interval(out, result, "ci_lower", "ci_upper");
    check_interval(out, result, "slope_ci_lower", "slope_ci_upper");

    if let Some(effect) = result.summary_number("effect_size") {
        if effect.abs() > 5.0 {
            out.warn(
                FindingCategory::OutputSanity,
                format!("effect size {effect:.2} is implausibly large; check the units"),
            );
        }
    }

    // Non-finite numbers are serialized as nulls; a null where a statistic
    // belongs means the computation degenerated silently.
    for key in ["p_value", "t_statistic", "f_statistic", "chi2_statistic"] {
        if matches!(result.summary.get(key), Some(Value::Null)) {
            out.block(
                FindingCategory::OutputSanity,
                format!("statistic '{key}' is not a finite number"),
            );
        }
    }

    if definition.category.expects_charts() && result.charts.is_empty() {
        out.warn(
            FindingCategory::OutputSanity,
            format!("'{}' normally produces charts but none were attached", definition.id),
        );
    }
}

fn check_interval(out: &mut Collector, result: &AnalysisResult, lower: &str, upper: &str) {
    if let (Some(lo), Some(hi)) = (result.summary_number(lower), result.summary_number(upper)) {
        if lo > hi {
            out.block(
                FindingCategory::OutputSanity,
                format!("confidence interval is inverted: {lower} {lo} exceeds {upper} {hi}"),
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Assumption checks
// ----------------------------------------------------------------------------

fn check_assumptions(
    out: &mut Collector,
    dataset: &Dataset,
    config: &TestConfig,
    definition: &TestDefinition,
    limits: &ValidationLimits,
) {
    for assumption in definition.assumptions {
        match assumption {
            AssumptionCheck::Normality => check_normality(out, dataset, config, definition),
            AssumptionCheck::EqualVariance => {
                check_equal_variance(out, dataset, config, definition)
            }
            AssumptionCheck::ExpectedCellCounts => {
                check_cell_counts(out, dataset, config, definition)
            }
            AssumptionCheck::Multicollinearity => {
                check_multicollinearity(out, dataset, config, limits)
            }
        }
    }
}

fn check_normality(
    out: &mut Collector,
    dataset: &Dataset,
    config: &TestConfig,
    definition: &TestDefinition,
) {
    // Grouped tests assume normality within each group, not of the pooled
    // sample (pooling separated groups looks non-normal even when every
    // group is fine).
    if let Some(group_field) = definition.group_field {
        let (Some(value_col), Some(group_col)) = (
            value_column(config, definition, group_field),
            config.text_opt(group_field),
        ) else {
            return;
        };
        let Ok(groups) = dataset.grouped(&value_col, group_col) else { return };
        for (label, xs) in &groups {
            let subject = format!("column '{value_col}' in group '{label}'");
            assess_normality(out, definition, &subject, xs);
        }
        return;
    }

    for name in configured_columns(config, definition) {
        let is_numeric = dataset
            .column(&name)
            .is_some_and(|c| c.semantic.is_numeric());
        if !is_numeric {
            continue;
        }
        let Ok(xs) = dataset.numeric(&name) else { continue };
        let subject = format!("column '{name}'");
        assess_normality(out, definition, &subject, &xs);
    }
}

fn assess_normality(
    out: &mut Collector,
    definition: &TestDefinition,
    subject: &str,
    xs: &[f64],
) {
    if xs.len() < 8 {
        out.push(
            FindingCategory::Assumption,
            Severity::Info,
            format!(
                "{subject} has {} observations; too few to assess normality",
                xs.len()
            ),
            None,
        );
        return;
    }
    if let Ok((_, p)) = stats::dagostino_k2(xs) {
        if p < 0.05 {
            out.push(
                FindingCategory::Assumption,
                Severity::Warning,
                format!("{subject} departs from normality (omnibus p = {p:.4})"),
                definition.alternative,
            );
        }
    }
}

fn check_equal_variance(
    out: &mut Collector,
    dataset: &Dataset,
    config: &TestConfig,
    definition: &TestDefinition,
) {
    let Some(group_field) = definition.group_field else { return };
    let (Some(value_col), Some(group_col)) = (
        value_column(config, definition, group_field),
        config.text_opt(group_field),
    ) else {
        return;
    };
    let Ok(groups) = dataset.grouped(&value_col, group_col) else { return };
    let samples: Vec<Vec<f64>> = groups.into_values().collect();
    if let Ok((_, p)) = stats::levene_brown_forsythe(&samples) {
        if p < 0.05 {
            out.push(
                FindingCategory::Assumption,
                Severity::Warning,
                format!(
                    "group variances differ (Levene p = {p:.4}); pooled-variance results are suspect"
                ),
                definition.alternative,
            );
        }
    }
}

fn check_cell_counts(
    out: &mut Collector,
    dataset: &Dataset,
    config: &TestConfig,
    definition: &TestDefinition,
) {
    let (Some(row_col), Some(col_col)) =
        (config.text_opt("row_column"), config.text_opt("col_column"))
    else {
        return;
    };
    let Ok(pairs) = dataset.label_pairs(row_col, col_col) else { return };

    let mut counts: BTreeMap<(String, String), f64> = BTreeMap::new();
    let mut row_labels: Vec<String> = Vec::new();
    let mut col_labels: Vec<String> = Vec::new();
    for (r, c) in pairs {
        if !row_labels.contains(&r) {
            row_labels.push(r.clone());
        }
        if !col_labels.contains(&c) {
            col_labels.push(c.clone());
        }
        *counts.entry((r, c)).or_insert(0.0) += 1.0;
    }
    let observed: Vec<Vec<f64>> = row_labels
        .iter()
        .map(|r| {
            col_labels
                .iter()
                .map(|c| counts.get(&(r.clone(), c.clone())).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();

    let Ok((_, _, _, expected)) = stats::chi2_contingency(&observed) else { return };
    let total_cells = expected.len() * expected.first().map(Vec::len).unwrap_or(0);
    let low_cells = expected
        .iter()
        .flatten()
        .filter(|&&e| e < 5.0)
        .count();
    if total_cells > 0 && low_cells as f64 / total_cells as f64 > 0.20 {
        out.push(
            FindingCategory::Assumption,
            Severity::Warning,
            format!(
                "{low_cells} of {total_cells} cells have expected counts below 5; \
                 the chi-square approximation is unreliable"
            ),
            definition.alternative,
        );
        out.recommend("combine small categories or use an exact test");
    }
}

fn check_multicollinearity(
    out: &mut Collector,
    dataset: &Dataset,
    config: &TestConfig,
    limits: &ValidationLimits,
) {
    let Ok(predictors) = config.text_list("predictor_columns") else { return };
    if predictors.len() < 2 {
        return;
    }
    let Ok(matrix) = dataset.matrix(&predictors) else { return };
    let Ok(vifs) = stats::variance_inflation(&matrix) else { return };
    for (name, vif) in predictors.iter().zip(&vifs) {
        if *vif > limits.vif_threshold {
            out.warn(
                FindingCategory::Assumption,
                format!(
                    "predictor '{name}' has VIF {vif:.1} (threshold {:.1}); \
                     its coefficient is unstable",
                    limits.vif_threshold
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use crate::dispatch::{Dispatcher, ExecutionRequest};
    use serde_json::json;

    fn run(
        request_id: &str,
        test_id: &str,
        config: serde_json::Value,
        dataset: &Dataset,
    ) -> (AnalysisResult, TestConfig) {
        let dispatcher = Dispatcher::new().unwrap();
        let cfg = TestConfig::from_value(config).unwrap();
        let request =
            ExecutionRequest::new(request_id, test_id, cfg.clone(), dataset.clone());
        (dispatcher.execute(&request).unwrap(), cfg)
    }

    #[test]
    fn clean_result_earns_high_confidence() {
        // Symmetric, center-weighted sample; close enough to normal that the
        // omnibus test stays quiet.
        let offsets = [-2.0, -1.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 2.0];
        let records: Vec<serde_json::Value> = (0..40)
            .map(|i| json!({"value": 10.0 + offsets[i % offsets.len()] * 0.3}))
            .collect();
        let ds = Dataset::from_records(&records).unwrap();
        let (result, cfg) = run("v1", "one_sample_t", json!({"column": "value", "mu": 10.0}), &ds);
        let def = catalog().unwrap().get("one_sample_t").unwrap();
        let report = validate(&result, &ds, &cfg, def, &ValidationLimits::default());
        assert!(report.passed);
        assert_eq!(report.confidence, Confidence::High);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn failed_analysis_is_blocking_and_low_confidence() {
        let records: Vec<serde_json::Value> =
            (0..15).map(|_| json!({"value": 10.0})).collect();
        let ds = Dataset::from_records(&records).unwrap();
        let (result, cfg) = run(
            "v2",
            "capability_normal",
            json!({"value_column": "value", "lsl": 9.0, "usl": 11.0}),
            &ds,
        );
        assert!(!result.success);
        let def = catalog().unwrap().get("capability_normal").unwrap();
        let report = validate(&result, &ds, &cfg, def, &ValidationLimits::default());
        assert!(!report.passed);
        assert_eq!(report.confidence, Confidence::Low);
        assert_eq!(report.findings[0].category, FindingCategory::Execution);
        assert_eq!(report.findings[0].severity, Severity::Blocking);
    }

    #[test]
    fn sparse_contingency_table_draws_an_assumption_warning() {
        // 3x3 table over 12 rows; most expected counts land under 5.
        let rows = ["a", "a", "a", "b", "b", "b", "c", "c", "c", "a", "b", "c"];
        let cols = ["x", "y", "z", "x", "y", "z", "x", "y", "z", "x", "y", "z"];
        let records: Vec<serde_json::Value> = rows
            .iter()
            .zip(&cols)
            .map(|(r, c)| json!({"shift": r, "defect": c}))
            .collect();
        let ds = Dataset::from_records(&records).unwrap();
        let (result, cfg) = run(
            "v3",
            "chi_square_association",
            json!({"row_column": "shift", "col_column": "defect"}),
            &ds,
        );
        let def = catalog().unwrap().get("chi_square_association").unwrap();
        let report = validate(&result, &ds, &cfg, def, &ValidationLimits::default());
        assert!(report.passed);
        assert_eq!(report.confidence, Confidence::Medium);
        assert!(report
            .findings
            .iter()
            .any(|f| f.category == FindingCategory::Assumption
                && f.message.contains("expected counts")));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("exact test")));
    }

    #[test]
    fn warning_budget_overflow_drops_confidence_to_low() {
        let mut out = Collector::new();
        for i in 0..4 {
            out.warn(FindingCategory::InputData, format!("warning {i}"));
        }
        let report = out.into_report(&ValidationLimits::default());
        assert!(report.passed);
        assert_eq!(report.warnings(), 4);
        assert_eq!(report.confidence, Confidence::Low);
    }

    #[test]
    fn inverted_interval_is_blocking() {
        let mut output = crate::result::RawTestOutput::default();
        output.summary.insert("ci_lower".into(), json!(2.0));
        output.summary.insert("ci_upper".into(), json!(1.0));
        output.summary.insert("p_value".into(), json!(0.5));
        let result = AnalysisResult::succeeded(
            "one_sample_t",
            crate::result::TestCategory::Comparison,
            output,
            1,
            0,
        );
        let mut out = Collector::new();
        let def = catalog().unwrap().get("one_sample_t").unwrap();
        check_outputs(&mut out, &result, def);
        let report = out.into_report(&ValidationLimits::default());
        assert!(!report.passed);
    }

    #[test]
    fn skewed_data_names_the_alternative_test() {
        // Geometric growth within each arm: a heavy right tail the omnibus
        // test rejects decisively.
        let mut records = Vec::new();
        for i in 0..30 {
            let skewed = 1.6_f64.powi((i % 15) as i32);
            let arm = if i < 15 { "control" } else { "treatment" };
            records.push(json!({"response": skewed, "arm": arm}));
        }
        let ds = Dataset::from_records(&records).unwrap();
        let (result, cfg) = run(
            "v4",
            "two_sample_t",
            json!({"value_column": "response", "group_column": "arm"}),
            &ds,
        );
        let def = catalog().unwrap().get("two_sample_t").unwrap();
        let report = validate(&result, &ds, &cfg, def, &ValidationLimits::default());
        let normality = report
            .findings
            .iter()
            .find(|f| f.message.contains("normality"));
        assert!(normality.is_some());
        assert_eq!(
            normality.and_then(|f| f.alternative.as_deref()),
            Some("mann_whitney")
        );
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("mann_whitney")));
    }
}
