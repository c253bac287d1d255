//! Descriptive statistics, normality testing, and Pareto analysis.

use serde_json::Value;

use crate::charts;
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::errors::EngineError;
use crate::result::RawTestOutput;
use crate::runners::helpers::{
    boolean, build, int, json_num, num, num_array, object, opt_num, round, str_array, text,
};
use crate::runners::{Cancellation, RunnerRegistry};
use crate::stats;

pub fn register_descriptive_runners(registry: &mut RunnerRegistry) {
    registry.register("descriptive_summary", descriptive_summary);
    registry.register("normality_test", normality_test);
    registry.register("pareto_analysis", pareto_analysis);
}

/// Per-column summary statistics with histograms.
pub fn descriptive_summary(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let columns = config.text_list("columns")?;
    let mut output = RawTestOutput::default();
    let mut per_column = serde_json::Map::new();
    let mut analyzed: Vec<String> = Vec::new();

    for col in &columns {
        cancel.check()?;
        let xs = dataset.numeric(col)?;
        if xs.is_empty() {
            output.warn(format!("column '{col}' has no numeric values"));
            continue;
        }
        per_column.insert(col.clone(), Value::Object(column_stats(dataset, col, &xs)?));
        analyzed.push(col.clone());
        output
            .charts
            .push(charts::histogram(&xs, col, &format!("Distribution of {col}")));
    }

    if analyzed.is_empty() {
        return Err(EngineError::computation(
            "no numeric data in the selected columns",
        ));
    }

    // Single-column requests surface the stats at the top level.
    output.summary = if analyzed.len() == 1 {
        match per_column.get(&analyzed[0]) {
            Some(Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        }
    } else {
        per_column.clone()
    };
    object(&mut output.details, "columns", per_column);

    int(&mut output.interpretation_context, "column_count", analyzed.len());
    str_array(&mut output.interpretation_context, "columns_analyzed", &analyzed);
    Ok(output)
}

fn column_stats(
    dataset: &Dataset,
    col: &str,
    xs: &[f64],
) -> Result<crate::result::JsonMap, EngineError> {
    let n = xs.len();
    let mean = stats::mean(xs);
    let std = stats::std_dev(xs);
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let q1 = stats::percentile(xs, 25.0);
    let q3 = stats::percentile(xs, 75.0);
    let missing = dataset.missing_fraction(col)?;

    Ok(build(|m| {
        int(m, "n", n);
        num(m, "mean", mean);
        num(m, "median", stats::median(xs));
        num(m, "std", std);
        num(m, "variance", stats::variance(xs));
        num(m, "min", min);
        num(m, "max", max);
        num(m, "range", max - min);
        num(m, "q1", q1);
        num(m, "q3", q3);
        num(m, "iqr", q3 - q1);
        opt_num(m, "skewness", stats::skewness(xs));
        opt_num(m, "kurtosis", stats::kurtosis(xs));
        if let Some((mode, count)) = stats::mode(xs) {
            num(m, "mode", mode);
            int(m, "mode_count", count);
        }
        if mean != 0.0 {
            num(m, "cv", round(std / mean.abs() * 100.0, 2));
        }
        num(m, "missing_pct", round(missing * 100.0, 2));
    }))
}

/// D'Agostino K-squared omnibus with histogram and probability plot.
pub fn normality_test(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let column = config.text("column")?;
    let alpha = config.number_or("alpha", 0.05);
    let xs = dataset.numeric(column)?;
    let n = xs.len();

    cancel.check()?;
    let (k2, p) = stats::dagostino_k2(&xs)?;
    let is_normal = p >= alpha;

    let mut output = RawTestOutput::default();
    if n > 5000 {
        output.warn(format!(
            "sample size ({n}) is very large; the omnibus test may flag trivial departures. \
             Weigh the histogram and probability plot alongside the p-value"
        ));
    }

    boolean(&mut output.summary, "is_normal", is_normal);
    num(&mut output.summary, "statistic", k2);
    num(&mut output.summary, "p_value", p);
    num(&mut output.summary, "alpha", alpha);
    int(&mut output.summary, "n", n);

    text(&mut output.details, "column", column);
    text(&mut output.details, "method", "dagostino_k2");
    object(
        &mut output.details,
        "descriptive",
        build(|m| {
            num(m, "mean", stats::mean(&xs));
            num(m, "std", stats::std_dev(&xs));
            opt_num(m, "skewness", stats::skewness(&xs));
            opt_num(m, "kurtosis", stats::kurtosis(&xs));
        }),
    );

    output
        .charts
        .push(charts::histogram(&xs, column, &format!("Distribution of {column}")));
    output.charts.push(probability_plot(&xs, column));

    text(&mut output.interpretation_context, "column", column);
    text(
        &mut output.interpretation_context,
        "conclusion",
        if is_normal { "normal" } else { "not normal" },
    );
    num(&mut output.interpretation_context, "p_value", p);
    num(&mut output.interpretation_context, "alpha", alpha);
    int(&mut output.interpretation_context, "sample_size", n);
    text(
        &mut output.interpretation_context,
        "recommendation",
        if is_normal {
            "Data appears normally distributed. Parametric tests (t-test, ANOVA) are appropriate."
        } else {
            "Data does NOT appear normally distributed. Consider non-parametric alternatives \
             (mann_whitney, kruskal_wallis) or a transformation."
        },
    );
    Ok(output)
}

/// Normal probability plot: sorted data against theoretical quantiles.
fn probability_plot(xs: &[f64], column: &str) -> crate::charts::ChartSpec {
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let theoretical: Vec<f64> = (0..n)
        .map(|i| stats::normal_quantile((i as f64 + 0.5) / n as f64))
        .collect();
    charts::scatter(
        &theoretical,
        &sorted,
        &format!("Normal Probability Plot - {column}"),
        "Theoretical quantile",
        column,
    )
}

/// Pareto analysis: vital-few identification at the 80% line.
pub fn pareto_analysis(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let category_col = config.text("category_column")?;
    let top_n = config.integer_opt("top_n").and_then(|v| usize::try_from(v).ok());

    // Sum a value column per category when given, otherwise count occurrences.
    let mut totals: Vec<(String, f64)> = if let Some(value_col) = config.text_opt("value_column") {
        dataset
            .grouped(value_col, category_col)?
            .into_iter()
            .map(|(label, values)| (label, values.iter().sum()))
            .collect()
    } else {
        let labels = dataset.labels(category_col)?;
        let mut counts: std::collections::BTreeMap<String, f64> = std::collections::BTreeMap::new();
        for label in labels {
            *counts.entry(label).or_insert(0.0) += 1.0;
        }
        counts.into_iter().collect()
    };

    cancel.check()?;
    totals.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    if let Some(top) = top_n {
        totals.truncate(top);
    }
    if totals.is_empty() {
        return Err(EngineError::computation(format!(
            "no usable categories in '{category_col}'"
        )));
    }

    let categories: Vec<String> = totals.iter().map(|(c, _)| c.clone()).collect();
    let values: Vec<f64> = totals.iter().map(|(_, v)| *v).collect();
    let total: f64 = values.iter().sum::<f64>().max(f64::MIN_POSITIVE);

    let mut cumulative = Vec::with_capacity(values.len());
    let mut running = 0.0;
    for v in &values {
        running += v;
        cumulative.push(round(running / total * 100.0, 2));
    }

    let mut vital_few: Vec<String> = Vec::new();
    for (cat, cum) in categories.iter().zip(&cumulative) {
        vital_few.push(cat.clone());
        if *cum >= 80.0 {
            break;
        }
    }
    let vital_few_pct = cumulative.get(vital_few.len() - 1).copied().unwrap_or(0.0);

    let mut output = RawTestOutput::default();
    num(&mut output.summary, "total", total);
    int(&mut output.summary, "category_count", categories.len());
    int(&mut output.summary, "vital_few_count", vital_few.len());
    num(&mut output.summary, "vital_few_pct", vital_few_pct);
    str_array(&mut output.summary, "vital_few", &vital_few);

    str_array(&mut output.details, "categories", &categories);
    num_array(&mut output.details, "values", &values);
    num_array(&mut output.details, "cumulative_percentages", &cumulative);
    let trivial: Vec<String> = categories
        .iter()
        .filter(|c| !vital_few.contains(c))
        .cloned()
        .collect();
    str_array(&mut output.details, "trivial_many", &trivial);

    output.charts.push(charts::pareto(
        &categories,
        &values,
        &cumulative,
        &format!("Pareto Analysis - {category_col}"),
        config.text_opt("value_column").unwrap_or("Count"),
    ));

    text(&mut output.interpretation_context, "category_column", category_col);
    output
        .interpretation_context
        .insert("top_category".into(), Value::String(categories[0].clone()));
    output
        .interpretation_context
        .insert("top_category_pct".into(), json_num(round(values[0] / total * 100.0, 2)));
    text(
        &mut output.interpretation_context,
        "recommendation",
        format!(
            "Focus on the vital few: {}. These {} categories account for {vital_few_pct:.1}% of the total.",
            vital_few.join(", "),
            vital_few.len()
        ),
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

    #[test]
    fn summary_surfaces_single_column_stats() {
        let records: Vec<serde_json::Value> =
            (0..10).map(|i| json!({"x": i as f64})).collect();
        let ds = Dataset::from_records(&records).unwrap();
        let out = descriptive_summary(
            &ds,
            &cfg(json!({"columns": ["x"]})),
            &Cancellation::new(),
        )
        .unwrap();
        assert_eq!(out.summary.get("n"), Some(&json!(10)));
        assert_eq!(out.summary.get("mean"), Some(&json!(4.5)));
        assert_eq!(out.charts.len(), 1);
    }

    #[test]
    fn normality_flags_heavy_skew() {
        let records: Vec<serde_json::Value> = (0..60)
            .map(|i| json!({"x": (i as f64 / 10.0).exp()}))
            .collect();
        let ds = Dataset::from_records(&records).unwrap();
        let out =
            normality_test(&ds, &cfg(json!({"column": "x"})), &Cancellation::new()).unwrap();
        assert_eq!(out.summary.get("is_normal"), Some(&json!(false)));
        assert_eq!(out.charts.len(), 2);
    }

    #[test]
    fn pareto_identifies_vital_few() {
        let mut records = Vec::new();
        for _ in 0..80 {
            records.push(json!({"defect": "scratch"}));
        }
        for _ in 0..15 {
            records.push(json!({"defect": "dent"}));
        }
        for _ in 0..5 {
            records.push(json!({"defect": "crack"}));
        }
        let ds = Dataset::from_records(&records).unwrap();
        let out = pareto_analysis(
            &ds,
            &cfg(json!({"category_column": "defect"})),
            &Cancellation::new(),
        )
        .unwrap();
        assert_eq!(out.summary.get("vital_few"), Some(&json!(["scratch"])));
        assert_eq!(out.summary.get("category_count"), Some(&json!(3)));
    }
}
