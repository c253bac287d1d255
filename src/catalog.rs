//! The static test catalog.
//!
//! Every executable test is described by a `TestDefinition`: its config
//! schema, column roles, minimum data requirements, assumption profile, and
//! recommended fallback. The catalog is built once, verified against its own
//! integrity rules, and never mutated afterwards.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::config::TestConfig;
use crate::dataset::{Dataset, DatasetProfile, SemanticType};
use crate::errors::EngineError;
use crate::result::TestCategory;

// ============================================================================
// SCHEMA TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A single column name.
    Column,
    /// A list of column names.
    ColumnList,
    Number,
    Integer,
    Text,
    /// A list of numbers (e.g. expected category probabilities).
    NumberList,
}

#[derive(Debug, Clone, Copy)]
pub enum Constraint {
    Positive,
    /// Strictly inside (0, 1).
    Probability,
    MinItems(usize),
    IntRange(i64, i64),
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Accepted column semantics; only meaningful for column kinds.
    pub accepts: &'static [SemanticType],
    pub constraint: Option<Constraint>,
}

/// Deterministic checks the validator runs after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssumptionCheck {
    Normality,
    EqualVariance,
    ExpectedCellCounts,
    Multicollinearity,
}

/// Cross-field configuration rule (e.g. "at least one spec limit").
pub type CrossRule = fn(&TestConfig) -> Result<(), String>;

/// Predicate deciding whether a test makes sense for a dataset shape.
pub type Applicability = fn(&DatasetProfile) -> bool;

#[derive(Debug, Clone, Copy)]
pub struct TestDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub category: TestCategory,
    pub fields: &'static [ConfigField],
    /// Minimum usable rows in the dataset.
    pub min_samples: usize,
    /// Minimum observations per group; 0 when the test is not grouped.
    pub min_per_group: usize,
    /// Config field naming the grouping column, when grouped.
    pub group_field: Option<&'static str>,
    pub assumptions: &'static [AssumptionCheck],
    /// Recommended alternative when assumptions are violated.
    pub alternative: Option<&'static str>,
    pub cross_rule: Option<CrossRule>,
    pub applicability: Option<Applicability>,
}

// ============================================================================
// FIELD CONSTRUCTORS
// ============================================================================

pub const NUMERIC: &[SemanticType] = &[
    SemanticType::Continuous,
    SemanticType::Count,
    SemanticType::Ordinal,
];
pub const CATEGORICAL: &[SemanticType] = &[
    SemanticType::Categorical,
    SemanticType::Count,
    SemanticType::Ordinal,
];
pub const COUNT: &[SemanticType] = &[SemanticType::Count];

const fn column(name: &'static str, accepts: &'static [SemanticType]) -> ConfigField {
    ConfigField {
        name,
        kind: FieldKind::Column,
        required: true,
        accepts,
        constraint: None,
    }
}

const fn column_opt(name: &'static str, accepts: &'static [SemanticType]) -> ConfigField {
    ConfigField {
        name,
        kind: FieldKind::Column,
        required: false,
        accepts,
        constraint: None,
    }
}

const fn column_list(name: &'static str, min_items: usize) -> ConfigField {
    ConfigField {
        name,
        kind: FieldKind::ColumnList,
        required: true,
        accepts: NUMERIC,
        constraint: Some(Constraint::MinItems(min_items)),
    }
}

const fn number(name: &'static str) -> ConfigField {
    ConfigField {
        name,
        kind: FieldKind::Number,
        required: true,
        accepts: &[],
        constraint: None,
    }
}

const fn number_opt(name: &'static str, constraint: Option<Constraint>) -> ConfigField {
    ConfigField {
        name,
        kind: FieldKind::Number,
        required: false,
        accepts: &[],
        constraint,
    }
}

const fn integer(name: &'static str, constraint: Option<Constraint>) -> ConfigField {
    ConfigField {
        name,
        kind: FieldKind::Integer,
        required: true,
        accepts: &[],
        constraint,
    }
}

const fn integer_opt(name: &'static str, constraint: Option<Constraint>) -> ConfigField {
    ConfigField {
        name,
        kind: FieldKind::Integer,
        required: false,
        accepts: &[],
        constraint,
    }
}

const ALPHA: ConfigField = number_opt("alpha", Some(Constraint::Probability));

// ============================================================================
// CROSS-FIELD RULES AND APPLICABILITY
// ============================================================================

fn capability_needs_a_limit(cfg: &TestConfig) -> Result<(), String> {
    if cfg.has("lsl") || cfg.has("usl") {
        Ok(())
    } else {
        Err("at least one of 'lsl' or 'usl' must be provided".into())
    }
}

fn spec_limits_ordered(cfg: &TestConfig) -> Result<(), String> {
    if let (Some(lsl), Some(usl)) = (cfg.number_opt("lsl"), cfg.number_opt("usl")) {
        if lsl >= usl {
            return Err(format!("'lsl' ({lsl}) must be below 'usl' ({usl})"));
        }
    }
    Ok(())
}

fn capability_rule(cfg: &TestConfig) -> Result<(), String> {
    capability_needs_a_limit(cfg)?;
    spec_limits_ordered(cfg)
}

fn needs_numeric_and_categorical(profile: &DatasetProfile) -> bool {
    !profile.numeric_columns.is_empty() && !profile.categorical_columns.is_empty()
}

fn needs_two_numeric(profile: &DatasetProfile) -> bool {
    profile.numeric_columns.len() >= 2
}

fn needs_categorical(profile: &DatasetProfile) -> bool {
    !profile.categorical_columns.is_empty()
}

fn needs_two_categorical(profile: &DatasetProfile) -> bool {
    profile.categorical_columns.len() >= 2
}

fn needs_numeric(profile: &DatasetProfile) -> bool {
    !profile.numeric_columns.is_empty()
}

// ============================================================================
// DEFINITIONS
// ============================================================================

static DEFINITIONS: &[TestDefinition] = &[
    // -- Descriptive ---------------------------------------------------------
    TestDefinition {
        id: "descriptive_summary",
        name: "Descriptive Summary",
        category: TestCategory::Descriptive,
        fields: &[column_list("columns", 1)],
        min_samples: 2,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    TestDefinition {
        id: "normality_test",
        name: "Normality Test",
        category: TestCategory::Descriptive,
        fields: &[column("column", NUMERIC), ALPHA],
        min_samples: 8,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    TestDefinition {
        id: "pareto_analysis",
        name: "Pareto Analysis",
        category: TestCategory::Descriptive,
        fields: &[
            column("category_column", CATEGORICAL),
            column_opt("value_column", NUMERIC),
            integer_opt("top_n", Some(Constraint::Positive)),
        ],
        min_samples: 2,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_categorical),
    },
    // -- Comparison ----------------------------------------------------------
    TestDefinition {
        id: "one_sample_t",
        name: "One-Sample t-Test",
        category: TestCategory::Comparison,
        fields: &[column("column", NUMERIC), number("mu"), ALPHA],
        min_samples: 3,
        min_per_group: 0,
        group_field: None,
        assumptions: &[AssumptionCheck::Normality],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    TestDefinition {
        id: "two_sample_t",
        name: "Two-Sample t-Test",
        category: TestCategory::Comparison,
        fields: &[
            column("value_column", NUMERIC),
            column("group_column", CATEGORICAL),
            ALPHA,
        ],
        min_samples: 4,
        min_per_group: 2,
        group_field: Some("group_column"),
        assumptions: &[AssumptionCheck::Normality, AssumptionCheck::EqualVariance],
        alternative: Some("mann_whitney"),
        cross_rule: None,
        applicability: Some(needs_numeric_and_categorical),
    },
    TestDefinition {
        id: "paired_t",
        name: "Paired t-Test",
        category: TestCategory::Comparison,
        fields: &[
            column("before_column", NUMERIC),
            column("after_column", NUMERIC),
            ALPHA,
        ],
        min_samples: 3,
        min_per_group: 0,
        group_field: None,
        assumptions: &[AssumptionCheck::Normality],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_two_numeric),
    },
    TestDefinition {
        id: "one_way_anova",
        name: "One-Way ANOVA",
        category: TestCategory::Comparison,
        fields: &[
            column("value_column", NUMERIC),
            column("group_column", CATEGORICAL),
            ALPHA,
        ],
        min_samples: 6,
        min_per_group: 2,
        group_field: Some("group_column"),
        assumptions: &[AssumptionCheck::Normality, AssumptionCheck::EqualVariance],
        alternative: Some("kruskal_wallis"),
        cross_rule: None,
        applicability: Some(needs_numeric_and_categorical),
    },
    TestDefinition {
        id: "mann_whitney",
        name: "Mann-Whitney U Test",
        category: TestCategory::Comparison,
        fields: &[
            column("value_column", NUMERIC),
            column("group_column", CATEGORICAL),
            ALPHA,
        ],
        min_samples: 4,
        min_per_group: 2,
        group_field: Some("group_column"),
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric_and_categorical),
    },
    TestDefinition {
        id: "kruskal_wallis",
        name: "Kruskal-Wallis Test",
        category: TestCategory::Comparison,
        fields: &[
            column("value_column", NUMERIC),
            column("group_column", CATEGORICAL),
            ALPHA,
        ],
        min_samples: 6,
        min_per_group: 2,
        group_field: Some("group_column"),
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric_and_categorical),
    },
    TestDefinition {
        id: "chi_square_association",
        name: "Chi-Square Test of Association",
        category: TestCategory::Comparison,
        fields: &[
            column("row_column", CATEGORICAL),
            column("col_column", CATEGORICAL),
            ALPHA,
        ],
        min_samples: 10,
        min_per_group: 0,
        group_field: None,
        assumptions: &[AssumptionCheck::ExpectedCellCounts],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_two_categorical),
    },
    TestDefinition {
        id: "chi_square_goodness",
        name: "Chi-Square Goodness of Fit",
        category: TestCategory::Comparison,
        fields: &[
            column("category_column", CATEGORICAL),
            ConfigField {
                name: "expected_probabilities",
                kind: FieldKind::NumberList,
                required: false,
                accepts: &[],
                constraint: None,
            },
            ALPHA,
        ],
        min_samples: 5,
        min_per_group: 0,
        group_field: None,
        assumptions: &[AssumptionCheck::ExpectedCellCounts],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_categorical),
    },
    // -- Regression ----------------------------------------------------------
    TestDefinition {
        id: "correlation",
        name: "Correlation Matrix",
        category: TestCategory::Regression,
        fields: &[column_list("columns", 2), ALPHA],
        min_samples: 3,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_two_numeric),
    },
    TestDefinition {
        id: "simple_regression",
        name: "Simple Linear Regression",
        category: TestCategory::Regression,
        fields: &[
            column("x_column", NUMERIC),
            column("y_column", NUMERIC),
            ALPHA,
        ],
        min_samples: 4,
        min_per_group: 0,
        group_field: None,
        assumptions: &[AssumptionCheck::Normality],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_two_numeric),
    },
    TestDefinition {
        id: "multiple_regression",
        name: "Multiple Linear Regression",
        category: TestCategory::Regression,
        fields: &[
            column_list("predictor_columns", 1),
            column("response_column", NUMERIC),
            ALPHA,
        ],
        min_samples: 10,
        min_per_group: 0,
        group_field: None,
        assumptions: &[AssumptionCheck::Multicollinearity],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_two_numeric),
    },
    // -- Process control -----------------------------------------------------
    TestDefinition {
        id: "i_mr_chart",
        name: "Individuals & Moving Range Chart",
        category: TestCategory::ProcessControl,
        fields: &[column("value_column", NUMERIC)],
        min_samples: 5,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    TestDefinition {
        id: "xbar_r_chart",
        name: "X-bar & R Chart",
        category: TestCategory::ProcessControl,
        fields: &[
            column("value_column", NUMERIC),
            integer("subgroup_size", Some(Constraint::IntRange(2, 10))),
        ],
        min_samples: 10,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    TestDefinition {
        id: "p_chart",
        name: "p Chart (Proportion Defective)",
        category: TestCategory::ProcessControl,
        fields: &[
            column("defective_column", COUNT),
            column("sample_size_column", COUNT),
        ],
        min_samples: 5,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    TestDefinition {
        id: "np_chart",
        name: "np Chart (Count Defective)",
        category: TestCategory::ProcessControl,
        fields: &[
            column("defective_column", COUNT),
            integer("sample_size", Some(Constraint::Positive)),
        ],
        min_samples: 5,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    TestDefinition {
        id: "c_chart",
        name: "c Chart (Defect Count)",
        category: TestCategory::ProcessControl,
        fields: &[column("defects_column", COUNT)],
        min_samples: 5,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    TestDefinition {
        id: "u_chart",
        name: "u Chart (Defects per Unit)",
        category: TestCategory::ProcessControl,
        fields: &[
            column("defects_column", COUNT),
            column("units_column", NUMERIC),
        ],
        min_samples: 5,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric),
    },
    // -- Capability ----------------------------------------------------------
    TestDefinition {
        id: "capability_normal",
        name: "Process Capability (Normal)",
        category: TestCategory::Capability,
        fields: &[
            column("value_column", NUMERIC),
            number_opt("lsl", None),
            number_opt("usl", None),
            number_opt("target", None),
            integer_opt("subgroup_size", Some(Constraint::IntRange(1, 10))),
        ],
        min_samples: 10,
        min_per_group: 0,
        group_field: None,
        assumptions: &[AssumptionCheck::Normality],
        alternative: None,
        cross_rule: Some(capability_rule),
        applicability: Some(needs_numeric),
    },
    // -- Factorial design ----------------------------------------------------
    TestDefinition {
        id: "full_factorial",
        name: "Full Factorial Design",
        category: TestCategory::FactorialDesign,
        fields: &[
            column("factor_column", CATEGORICAL),
            column("low_column", NUMERIC),
            column("high_column", NUMERIC),
            integer_opt("replicates", Some(Constraint::Positive)),
            integer_opt("seed", None),
        ],
        min_samples: 2,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric_and_categorical),
    },
    TestDefinition {
        id: "fractional_factorial",
        name: "Fractional Factorial Design (Half)",
        category: TestCategory::FactorialDesign,
        fields: &[
            column("factor_column", CATEGORICAL),
            column("low_column", NUMERIC),
            column("high_column", NUMERIC),
            integer_opt("replicates", Some(Constraint::Positive)),
            integer_opt("seed", None),
        ],
        min_samples: 3,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_numeric_and_categorical),
    },
    TestDefinition {
        id: "doe_analysis",
        name: "Factorial Effects Analysis",
        category: TestCategory::FactorialDesign,
        fields: &[
            column("response_column", NUMERIC),
            column_list("factor_columns", 2),
        ],
        min_samples: 4,
        min_per_group: 0,
        group_field: None,
        assumptions: &[],
        alternative: None,
        cross_rule: None,
        applicability: Some(needs_two_numeric),
    },
];

// ============================================================================
// CATALOG
// ============================================================================

pub struct Catalog {
    index: HashMap<&'static str, &'static TestDefinition>,
}

static CATALOG: Lazy<Result<Catalog, String>> =
    Lazy::new(|| Catalog::build().map_err(|e| e.to_string()));

/// The process-wide catalog, or a `Catalog` error when its integrity rules
/// are violated (an engine defect, not a caller error).
pub fn catalog() -> Result<&'static Catalog, EngineError> {
    match &*CATALOG {
        Ok(catalog) => Ok(catalog),
        Err(message) => Err(EngineError::Catalog {
            message: message.clone(),
        }),
    }
}

impl Catalog {
    fn build() -> Result<Self, EngineError> {
        let mut index: HashMap<&'static str, &'static TestDefinition> = HashMap::new();
        for def in DEFINITIONS {
            if index.insert(def.id, def).is_some() {
                return Err(EngineError::Catalog {
                    message: format!("duplicate test id '{}'", def.id),
                });
            }
            verify_definition(def)?;
        }
        // Alternatives must resolve inside the catalog.
        for def in DEFINITIONS {
            if let Some(alt) = def.alternative {
                if !index.contains_key(alt) {
                    return Err(EngineError::Catalog {
                        message: format!(
                            "test '{}' recommends unknown alternative '{alt}'",
                            def.id
                        ),
                    });
                }
            }
        }
        Ok(Self { index })
    }

    pub fn get(&self, id: &str) -> Option<&'static TestDefinition> {
        self.index.get(id).copied()
    }

    /// All test identifiers, sorted for stable output.
    pub fn list(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Tests whose applicability predicate and minimum sample size accept
    /// the given dataset shape.
    pub fn recommend(&self, profile: &DatasetProfile) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self
            .index
            .values()
            .filter(|def| profile.rows >= def.min_samples)
            .filter(|def| def.applicability.map_or(true, |pred| pred(profile)))
            .map(|def| def.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

fn verify_definition(def: &TestDefinition) -> Result<(), EngineError> {
    let has_required_column = def.fields.iter().any(|f| {
        f.required && matches!(f.kind, FieldKind::Column | FieldKind::ColumnList)
    });
    if !has_required_column {
        return Err(EngineError::Catalog {
            message: format!("test '{}' declares no required column role", def.id),
        });
    }
    if def.min_samples < 2 {
        return Err(EngineError::Catalog {
            message: format!("test '{}' has min_samples below 2", def.id),
        });
    }
    if def.group_field.is_some() && def.min_per_group == 0 {
        return Err(EngineError::Catalog {
            message: format!("grouped test '{}' must set min_per_group", def.id),
        });
    }
    Ok(())
}

// ============================================================================
// CONFIG AND ADEQUACY CHECKS
// ============================================================================

impl TestDefinition {
    /// Validates the request configuration against this schema.
    pub fn validate_config(
        &self,
        config: &TestConfig,
        dataset: &Dataset,
    ) -> Result<(), EngineError> {
        for field in self.fields {
            let value = config.get(field.name).filter(|v| !v.is_null());
            let Some(value) = value else {
                if field.required {
                    return Err(EngineError::configuration(format!(
                        "test '{}' requires field '{}'",
                        self.id, field.name
                    )));
                }
                continue;
            };
            self.check_field(field, value, dataset)?;
        }
        if let Some(rule) = self.cross_rule {
            rule(config).map_err(|message| {
                EngineError::configuration(format!("test '{}': {message}", self.id))
            })?;
        }
        Ok(())
    }

    fn check_field(
        &self,
        field: &ConfigField,
        value: &Value,
        dataset: &Dataset,
    ) -> Result<(), EngineError> {
        match field.kind {
            FieldKind::Column => {
                let name = value.as_str().ok_or_else(|| {
                    bad_field(self.id, field.name, "must be a column name string")
                })?;
                self.check_column_role(field, name, dataset)
            }
            FieldKind::ColumnList => {
                let items = value.as_array().ok_or_else(|| {
                    bad_field(self.id, field.name, "must be an array of column names")
                })?;
                if let Some(Constraint::MinItems(min)) = field.constraint {
                    if items.len() < min {
                        return Err(bad_field(
                            self.id,
                            field.name,
                            &format!("must name at least {min} column(s)"),
                        ));
                    }
                }
                for item in items {
                    let name = item.as_str().ok_or_else(|| {
                        bad_field(self.id, field.name, "must be an array of column names")
                    })?;
                    self.check_column_role(field, name, dataset)?;
                }
                Ok(())
            }
            FieldKind::Number => {
                let x = value
                    .as_f64()
                    .ok_or_else(|| bad_field(self.id, field.name, "must be a number"))?;
                self.check_numeric_constraint(field, x)
            }
            FieldKind::Integer => {
                let x = value
                    .as_i64()
                    .ok_or_else(|| bad_field(self.id, field.name, "must be an integer"))?;
                self.check_numeric_constraint(field, x as f64)
            }
            FieldKind::Text => value
                .as_str()
                .map(|_| ())
                .ok_or_else(|| bad_field(self.id, field.name, "must be a string")),
            FieldKind::NumberList => {
                let items = value.as_array().ok_or_else(|| {
                    bad_field(self.id, field.name, "must be an array of numbers")
                })?;
                if items.iter().any(|v| v.as_f64().is_none()) {
                    return Err(bad_field(self.id, field.name, "must be an array of numbers"));
                }
                Ok(())
            }
        }
    }

    fn check_column_role(
        &self,
        field: &ConfigField,
        name: &str,
        dataset: &Dataset,
    ) -> Result<(), EngineError> {
        let col = dataset.column(name).ok_or_else(|| {
            EngineError::configuration(format!(
                "test '{}': column '{name}' (field '{}') not found in dataset",
                self.id, field.name
            ))
        })?;
        if !field.accepts.is_empty() && !field.accepts.contains(&col.semantic) {
            let accepted: Vec<&str> = field.accepts.iter().map(|s| s.name()).collect();
            return Err(EngineError::configuration(format!(
                "test '{}': column '{name}' is {}; field '{}' accepts {}",
                self.id,
                col.semantic.name(),
                field.name,
                accepted.join("/")
            )));
        }
        Ok(())
    }

    fn check_numeric_constraint(&self, field: &ConfigField, x: f64) -> Result<(), EngineError> {
        match field.constraint {
            Some(Constraint::Positive) if x <= 0.0 => {
                Err(bad_field(self.id, field.name, "must be positive"))
            }
            Some(Constraint::Probability) if !(0.0..1.0).contains(&x) || x == 0.0 => {
                Err(bad_field(self.id, field.name, "must be strictly between 0 and 1"))
            }
            Some(Constraint::IntRange(lo, hi)) if x < lo as f64 || x > hi as f64 => Err(
                bad_field(self.id, field.name, &format!("must be between {lo} and {hi}")),
            ),
            _ => Ok(()),
        }
    }

    /// Checks that the dataset can support this test at all. Runs after
    /// config validation and before any computation.
    pub fn check_adequacy(
        &self,
        config: &TestConfig,
        dataset: &Dataset,
    ) -> Result<(), EngineError> {
        if dataset.row_count() < self.min_samples {
            return Err(EngineError::inadequate(format!(
                "test '{}' needs at least {} rows; dataset has {}",
                self.id,
                self.min_samples,
                dataset.row_count()
            )));
        }
        if let Some(group_field) = self.group_field {
            let group_col = config.text(group_field)?;
            let labels = dataset.labels(group_col)?;
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for label in &labels {
                *counts.entry(label.as_str()).or_default() += 1;
            }
            if counts.len() < 2 {
                return Err(EngineError::inadequate(format!(
                    "test '{}' needs at least 2 groups in '{group_col}'; found {}",
                    self.id,
                    counts.len()
                )));
            }
            if let Some((label, n)) = counts
                .iter()
                .min_by_key(|(_, n)| **n)
                .map(|(l, n)| (*l, *n))
            {
                if n < self.min_per_group {
                    return Err(EngineError::inadequate(format!(
                        "test '{}' needs at least {} observations per group; group '{label}' has {n}",
                        self.id, self.min_per_group
                    )));
                }
            }
        }
        Ok(())
    }
}

fn bad_field(test_id: &str, field: &str, requirement: &str) -> EngineError {
    EngineError::configuration(format!("test '{test_id}': field '{field}' {requirement}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_builds_and_registers_all_tests() {
        let catalog = catalog().unwrap();
        assert_eq!(catalog.len(), DEFINITIONS.len());
        assert_eq!(catalog.len(), 24);
        assert!(catalog.get("two_sample_t").is_some());
        assert!(catalog.get("shapiro_wilk").is_none());
    }

    #[test]
    fn every_definition_has_a_required_column_role() {
        for def in DEFINITIONS {
            assert!(
                def.fields.iter().any(|f| f.required
                    && matches!(f.kind, FieldKind::Column | FieldKind::ColumnList)),
                "{} lacks a required column role",
                def.id
            );
            assert!(def.min_samples >= 2, "{} min_samples too small", def.id);
        }
    }

    #[test]
    fn alternatives_resolve_within_the_catalog() {
        let catalog = catalog().unwrap();
        for def in DEFINITIONS {
            if let Some(alt) = def.alternative {
                assert!(catalog.get(alt).is_some(), "{alt} missing");
            }
        }
    }

    #[test]
    fn capability_rejects_missing_spec_limits() {
        let catalog = catalog().unwrap();
        let def = catalog.get("capability_normal").unwrap();
        let records: Vec<serde_json::Value> =
            (0..12).map(|i| json!({"measure": 10.0 + i as f64 * 0.1})).collect();
        let dataset = crate::dataset::Dataset::from_records(&records).unwrap();
        let config = TestConfig::from_value(json!({"value_column": "measure"})).unwrap();
        let err = def.validate_config(&config, &dataset).unwrap_err();
        assert!(err.to_string().contains("lsl"));
    }

    #[test]
    fn column_semantics_are_enforced() {
        let catalog = catalog().unwrap();
        let def = catalog.get("two_sample_t").unwrap();
        let records = vec![
            json!({"weight": 1.5, "line": "A"}),
            json!({"weight": 2.5, "line": "B"}),
        ];
        let dataset = crate::dataset::Dataset::from_records(&records).unwrap();
        // Categorical column where a numeric one is required.
        let config = TestConfig::from_value(
            json!({"value_column": "line", "group_column": "line"}),
        )
        .unwrap();
        assert!(def.validate_config(&config, &dataset).is_err());
    }

    #[test]
    fn adequacy_enforces_group_minimums() {
        let catalog = catalog().unwrap();
        let def = catalog.get("two_sample_t").unwrap();
        let records = vec![
            json!({"weight": 1.0, "line": "A"}),
            json!({"weight": 2.0, "line": "A"}),
            json!({"weight": 3.0, "line": "A"}),
            json!({"weight": 4.0, "line": "B"}),
        ];
        let dataset = crate::dataset::Dataset::from_records(&records).unwrap();
        let config = TestConfig::from_value(
            json!({"value_column": "weight", "group_column": "line"}),
        )
        .unwrap();
        assert!(def.validate_config(&config, &dataset).is_ok());
        let err = def.check_adequacy(&config, &dataset).unwrap_err();
        assert!(err.to_string().contains("per group"));
    }

    #[test]
    fn recommend_filters_by_shape() {
        let records = vec![
            json!({"x": 1.0}),
            json!({"x": 2.0}),
            json!({"x": 3.0}),
        ];
        let dataset = crate::dataset::Dataset::from_records(&records).unwrap();
        let catalog = catalog().unwrap();
        let ids = catalog.recommend(&dataset.profile());
        assert!(ids.contains(&"descriptive_summary"));
        // No categorical column, so grouped comparisons are out.
        assert!(!ids.contains(&"two_sample_t"));
    }
}
