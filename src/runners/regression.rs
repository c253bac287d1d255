//! Correlation matrices and least-squares regression.

use serde_json::Value;

use crate::charts;
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::errors::EngineError;
use crate::result::RawTestOutput;
use crate::runners::helpers::{
    array, boolean, build, int, json_num, num, num_array, object, str_array, text,
};
use crate::runners::{Cancellation, RunnerRegistry};
use crate::stats;

pub fn register_regression_runners(registry: &mut RunnerRegistry) {
    registry.register("correlation", correlation);
    registry.register("simple_regression", simple_regression);
    registry.register("multiple_regression", multiple_regression);
}

/// Pearson and Spearman correlation matrices with per-pair p-values.
pub fn correlation(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let columns = config.text_list("columns")?;
    let alpha = config.number_or("alpha", 0.05);

    let mut pearson = serde_json::Map::new();
    let mut spearman = serde_json::Map::new();
    let mut p_values = serde_json::Map::new();
    let mut strongest: Option<(String, String, f64, f64)> = None;

    for a in &columns {
        cancel.check()?;
        let mut p_row = serde_json::Map::new();
        let mut s_row = serde_json::Map::new();
        let mut pv_row = serde_json::Map::new();
        for b in &columns {
            if a == b {
                p_row.insert(b.clone(), json_num(1.0));
                s_row.insert(b.clone(), json_num(1.0));
                pv_row.insert(b.clone(), Value::Null);
                continue;
            }
            // Pairwise-complete observations.
            let (xs, ys) = dataset.paired(a, b)?;
            let r = stats::pearson(&xs, &ys)?;
            let rho = stats::spearman(&xs, &ys)?;
            let p = stats::correlation_p(r, xs.len())?;
            p_row.insert(b.clone(), json_num(r));
            s_row.insert(b.clone(), json_num(rho));
            pv_row.insert(b.clone(), json_num(p));
            let stronger = strongest
                .as_ref()
                .map_or(true, |(_, _, best, _)| r.abs() > best.abs());
            if stronger {
                strongest = Some((a.clone(), b.clone(), r, p));
            }
        }
        pearson.insert(a.clone(), Value::Object(p_row));
        spearman.insert(a.clone(), Value::Object(s_row));
        p_values.insert(a.clone(), Value::Object(pv_row));
    }

    let (sa, sb, sr, sp) = strongest
        .ok_or_else(|| EngineError::computation("correlation needs at least 2 columns"))?;

    let mut output = RawTestOutput::default();
    text(&mut output.summary, "strongest_pair", format!("{sa} ~ {sb}"));
    num(&mut output.summary, "strongest_r", sr);
    num(&mut output.summary, "strongest_p_value", sp);
    boolean(&mut output.summary, "significant", sp < alpha);
    int(&mut output.summary, "column_count", columns.len());

    object(&mut output.details, "pearson", pearson);
    object(&mut output.details, "spearman", spearman);
    object(&mut output.details, "p_values", p_values);
    num(&mut output.details, "alpha", alpha);

    if columns.len() == 2 {
        let (xs, ys) = dataset.paired(&columns[0], &columns[1])?;
        output.charts.push(charts::scatter(
            &xs,
            &ys,
            &format!("{} vs {}", columns[1], columns[0]),
            &columns[0],
            &columns[1],
        ));
    }

    str_array(&mut output.interpretation_context, "columns", &columns);
    text(
        &mut output.interpretation_context,
        "strongest_pair",
        format!("{sa} ~ {sb}"),
    );
    num(&mut output.interpretation_context, "strongest_r", sr);
    text(
        &mut output.interpretation_context,
        "strength",
        correlation_strength(sr),
    );
    Ok(output)
}

fn correlation_strength(r: f64) -> &'static str {
    let r = r.abs();
    if r < 0.3 {
        "weak"
    } else if r < 0.7 {
        "moderate"
    } else {
        "strong"
    }
}

/// Simple linear regression with slope inference and residual diagnostics.
pub fn simple_regression(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let x_col = config.text("x_column")?;
    let y_col = config.text("y_column")?;
    let alpha = config.number_or("alpha", 0.05);
    let (xs, ys) = dataset.paired(x_col, y_col)?;

    cancel.check()?;
    let predictors: Vec<Vec<f64>> = xs.iter().map(|&x| vec![x]).collect();
    let fit = stats::ols(&ys, &predictors)?;
    let slope = fit.coefficients[1];
    let intercept = fit.coefficients[0];
    let slope_se = fit.std_errors[1];
    let slope_p = fit.p_values[1];
    let t_crit = stats::t_quantile(1.0 - alpha / 2.0, fit.df_residual)?;

    let mut output = RawTestOutput::default();
    num(&mut output.summary, "slope", slope);
    num(&mut output.summary, "intercept", intercept);
    num(&mut output.summary, "r_squared", fit.r_squared);
    num(&mut output.summary, "p_value", slope_p);
    num(&mut output.summary, "slope_ci_lower", slope - t_crit * slope_se);
    num(&mut output.summary, "slope_ci_upper", slope + t_crit * slope_se);
    boolean(&mut output.summary, "significant", slope_p < alpha);
    int(&mut output.summary, "n", xs.len());

    num(&mut output.details, "slope_std_error", slope_se);
    num(&mut output.details, "adj_r_squared", fit.adj_r_squared);
    num(&mut output.details, "f_statistic", fit.f_statistic);
    num(&mut output.details, "f_p_value", fit.f_p_value);
    num(&mut output.details, "df", fit.df_residual);
    num(&mut output.details, "durbin_watson", stats::durbin_watson(&fit.residuals));
    num(&mut output.details, "alpha", alpha);

    output.charts.push(charts::fitted_line(
        &xs,
        &ys,
        &fit.fitted,
        &format!("{y_col} vs {x_col}"),
        x_col,
        y_col,
    ));
    output.charts.push(charts::scatter(
        &fit.fitted,
        &fit.residuals,
        "Residuals vs Fitted",
        "Fitted value",
        "Residual",
    ));

    num(&mut output.interpretation_context, "slope", slope);
    num(&mut output.interpretation_context, "r_squared", fit.r_squared);
    text(
        &mut output.interpretation_context,
        "direction",
        if slope >= 0.0 { "positive" } else { "negative" },
    );
    text(
        &mut output.interpretation_context,
        "finding",
        format!(
            "each unit of '{x_col}' changes '{y_col}' by {slope:.4}; model explains {:.1}% of variance",
            fit.r_squared * 100.0
        ),
    );
    Ok(output)
}

/// Multiple linear regression with a coefficient table and VIF diagnostics.
pub fn multiple_regression(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let predictor_cols = config.text_list("predictor_columns")?;
    let response_col = config.text("response_column")?;
    let alpha = config.number_or("alpha", 0.05);

    let mut all_cols = predictor_cols.clone();
    all_cols.push(response_col.to_string());
    let rows = dataset.matrix(&all_cols)?;
    if rows.is_empty() {
        return Err(EngineError::computation(
            "no complete rows across the selected columns",
        ));
    }
    let predictors: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| r[..predictor_cols.len()].to_vec())
        .collect();
    let response: Vec<f64> = rows.iter().map(|r| r[predictor_cols.len()]).collect();

    cancel.check()?;
    let fit = stats::ols(&response, &predictors)?;

    let mut terms = vec!["intercept".to_string()];
    terms.extend(predictor_cols.iter().cloned());
    let coefficient_table: Vec<Value> = terms
        .iter()
        .enumerate()
        .map(|(i, term)| {
            Value::Object(build(|m| {
                text(m, "term", term.clone());
                num(m, "coefficient", fit.coefficients[i]);
                num(m, "std_error", fit.std_errors[i]);
                num(m, "t_value", fit.t_values[i]);
                num(m, "p_value", fit.p_values[i]);
            }))
        })
        .collect();

    cancel.check()?;
    let mut output = RawTestOutput::default();
    let vifs = if predictor_cols.len() >= 2 {
        let vifs = stats::variance_inflation(&predictors)?;
        for (col, vif) in predictor_cols.iter().zip(&vifs) {
            if *vif > 10.0 {
                output.warn(format!(
                    "predictor '{col}' has VIF {vif:.1}; severe multicollinearity"
                ));
            }
        }
        Some(vifs)
    } else {
        None
    };

    num(&mut output.summary, "r_squared", fit.r_squared);
    num(&mut output.summary, "adj_r_squared", fit.adj_r_squared);
    num(&mut output.summary, "f_statistic", fit.f_statistic);
    num(&mut output.summary, "p_value", fit.f_p_value);
    boolean(&mut output.summary, "significant", fit.f_p_value < alpha);
    int(&mut output.summary, "n", response.len());
    int(&mut output.summary, "predictor_count", predictor_cols.len());

    array(&mut output.details, "coefficients", coefficient_table);
    if let Some(vifs) = &vifs {
        object(
            &mut output.details,
            "vif",
            build(|m| {
                for (col, vif) in predictor_cols.iter().zip(vifs) {
                    num(m, col, *vif);
                }
            }),
        );
    }
    num(&mut output.details, "df", fit.df_residual);
    num(&mut output.details, "durbin_watson", stats::durbin_watson(&fit.residuals));
    num(&mut output.details, "alpha", alpha);

    output.charts.push(charts::scatter(
        &fit.fitted,
        &fit.residuals,
        "Residuals vs Fitted",
        "Fitted value",
        "Residual",
    ));
    num_array(&mut output.details, "fitted", &fit.fitted);

    str_array(&mut output.interpretation_context, "predictors", &predictor_cols);
    text(&mut output.interpretation_context, "response", response_col);
    num(&mut output.interpretation_context, "r_squared", fit.r_squared);
    let significant: Vec<String> = terms
        .iter()
        .zip(&fit.p_values)
        .skip(1)
        .filter(|(_, &p)| p < alpha)
        .map(|(t, _)| t.clone())
        .collect();
    str_array(
        &mut output.interpretation_context,
        "significant_predictors",
        &significant,
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(v: serde_json::Value) -> TestConfig {
        TestConfig::from_value(v).unwrap()
    }

    fn linear_dataset() -> Dataset {
        let records: Vec<serde_json::Value> = (0..30)
            .map(|i| {
                let x = i as f64;
                let wiggle = if i % 2 == 0 { 0.5 } else { -0.5 };
                json!({"speed": x, "wear": 2.0 * x + 5.0 + wiggle, "noise": (i % 7) as f64})
            })
            .collect();
        Dataset::from_records(&records).unwrap()
    }

    #[test]
    fn simple_regression_recovers_slope() {
        let ds = linear_dataset();
        let out = simple_regression(
            &ds,
            &cfg(json!({"x_column": "speed", "y_column": "wear"})),
            &Cancellation::new(),
        )
        .unwrap();
        let slope = out.summary.get("slope").and_then(|v| v.as_f64()).unwrap();
        let r2 = out.summary.get("r_squared").and_then(|v| v.as_f64()).unwrap();
        assert!((slope - 2.0).abs() < 0.05);
        assert!(r2 > 0.99);
        let lo = out.summary.get("slope_ci_lower").and_then(|v| v.as_f64()).unwrap();
        let hi = out.summary.get("slope_ci_upper").and_then(|v| v.as_f64()).unwrap();
        assert!(lo < slope && slope < hi);
    }

    #[test]
    fn correlation_finds_the_strong_pair() {
        let ds = linear_dataset();
        let out = correlation(
            &ds,
            &cfg(json!({"columns": ["speed", "wear", "noise"]})),
            &Cancellation::new(),
        )
        .unwrap();
        let pair = out.summary.get("strongest_pair").and_then(|v| v.as_str()).unwrap();
        assert!(pair.contains("speed") && pair.contains("wear"));
        let r = out.summary.get("strongest_r").and_then(|v| v.as_f64()).unwrap();
        assert!(r > 0.99);
    }

    #[test]
    fn multiple_regression_warns_on_collinear_predictors() {
        let records: Vec<serde_json::Value> = (0..25)
            .map(|i| {
                let x = i as f64;
                json!({
                    "a": x,
                    "b": x * 2.0 + if i % 4 == 0 { 0.01 } else { 0.0 },
                    "y": 3.0 * x + 1.0 + if i % 2 == 0 { 0.2 } else { -0.2 },
                })
            })
            .collect();
        let ds = Dataset::from_records(&records).unwrap();
        let out = multiple_regression(
            &ds,
            &cfg(json!({"predictor_columns": ["a", "b"], "response_column": "y"})),
            &Cancellation::new(),
        )
        .unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("VIF")));
    }
}
