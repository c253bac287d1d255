//! Hypothesis tests comparing locations and distributions.
//!
//! Parametric (t family, ANOVA), rank-based (Mann-Whitney, Kruskal-Wallis),
//! and categorical (chi-square) comparisons. The two-sample t-test switches
//! between pooled and Welch variants based on a Levene pre-check, matching
//! standard Six Sigma practice.

use std::collections::BTreeMap;

use crate::charts;
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::errors::EngineError;
use crate::result::RawTestOutput;
use crate::runners::helpers::{
    boolean, build, int, num, num_array, object, opt_num, str_array, text,
};
use crate::runners::{Cancellation, RunnerRegistry};
use crate::stats;

pub fn register_comparison_runners(registry: &mut RunnerRegistry) {
    registry.register("one_sample_t", one_sample_t);
    registry.register("two_sample_t", two_sample_t);
    registry.register("paired_t", paired_t);
    registry.register("one_way_anova", one_way_anova);
    registry.register("mann_whitney", mann_whitney);
    registry.register("kruskal_wallis", kruskal_wallis);
    registry.register("chi_square_association", chi_square_association);
    registry.register("chi_square_goodness", chi_square_goodness);
}

fn two_groups(
    dataset: &Dataset,
    config: &TestConfig,
) -> Result<((String, Vec<f64>), (String, Vec<f64>)), EngineError> {
    let value_col = config.text("value_column")?;
    let group_col = config.text("group_column")?;
    let groups = dataset.grouped(value_col, group_col)?;
    if groups.len() != 2 {
        return Err(EngineError::computation(format!(
            "two-group comparison needs exactly 2 groups in '{group_col}'; found {}",
            groups.len()
        )));
    }
    let mut iter = groups.into_iter();
    let first = iter.next().ok_or_else(|| EngineError::computation("empty group map"))?;
    let second = iter.next().ok_or_else(|| EngineError::computation("empty group map"))?;
    Ok((first, second))
}

fn all_groups(
    dataset: &Dataset,
    config: &TestConfig,
) -> Result<BTreeMap<String, Vec<f64>>, EngineError> {
    let value_col = config.text("value_column")?;
    let group_col = config.text("group_column")?;
    let groups = dataset.grouped(value_col, group_col)?;
    if groups.len() < 2 {
        return Err(EngineError::computation(format!(
            "comparison needs at least 2 groups in '{group_col}'; found {}",
            groups.len()
        )));
    }
    Ok(groups)
}

/// One-sample t-test against a hypothesized mean.
pub fn one_sample_t(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let column = config.text("column")?;
    let mu = config.number("mu")?;
    let alpha = config.number_or("alpha", 0.05);
    let xs = dataset.numeric(column)?;
    let n = xs.len();
    if n < 2 {
        return Err(EngineError::computation(
            "one-sample t-test needs at least 2 numeric observations",
        ));
    }

    cancel.check()?;
    let mean = stats::mean(&xs);
    let sd = stats::std_dev(&xs);
    if sd <= 0.0 {
        return Err(EngineError::computation(format!(
            "column '{column}' has zero variance; the t statistic is undefined"
        )));
    }
    let se = sd / (n as f64).sqrt();
    let t = (mean - mu) / se;
    let df = (n - 1) as f64;
    let p = stats::t_p_two_sided(t, df)?;
    let t_crit = stats::t_quantile(1.0 - alpha / 2.0, df)?;
    let d = (mean - mu) / sd;

    let mut output = RawTestOutput::default();
    num(&mut output.summary, "t_statistic", t);
    num(&mut output.summary, "p_value", p);
    num(&mut output.summary, "df", df);
    num(&mut output.summary, "sample_mean", mean);
    num(&mut output.summary, "hypothesized_mean", mu);
    num(&mut output.summary, "ci_lower", mean - t_crit * se);
    num(&mut output.summary, "ci_upper", mean + t_crit * se);
    boolean(&mut output.summary, "significant", p < alpha);
    num(&mut output.summary, "effect_size", d);
    text(&mut output.summary, "effect_magnitude", stats::effect_label(d));

    int(&mut output.details, "n", n);
    num(&mut output.details, "std", sd);
    num(&mut output.details, "std_error", se);
    num(&mut output.details, "alpha", alpha);

    let mut hist = charts::histogram(&xs, column, &format!("Distribution of {column}"));
    hist.lines.push(charts::RefLine {
        label: format!("mu = {mu}"),
        value: mu,
    });
    output.charts.push(hist);

    comparison_context(&mut output, p, alpha, &format!(
        "mean of '{column}' vs {mu}: difference of {:.4}",
        mean - mu
    ));
    Ok(output)
}

/// Two-sample t-test with an automatic pooled/Welch switch.
pub fn two_sample_t(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let alpha = config.number_or("alpha", 0.05);
    let ((name_a, a), (name_b, b)) = two_groups(dataset, config)?;
    let (n1, n2) = (a.len(), b.len());
    if n1 < 2 || n2 < 2 {
        return Err(EngineError::computation(
            "each group needs at least 2 observations",
        ));
    }

    cancel.check()?;
    let (v1, v2) = (stats::variance(&a), stats::variance(&b));
    if v1 <= 0.0 && v2 <= 0.0 {
        return Err(EngineError::computation(
            "both groups have zero variance; the t statistic is undefined",
        ));
    }

    // Levene (Brown-Forsythe) decides pooled vs Welch.
    let (levene_w, levene_p) = stats::levene_brown_forsythe(&[a.clone(), b.clone()])?;
    let equal_variance = levene_p >= 0.05;

    let (m1, m2) = (stats::mean(&a), stats::mean(&b));
    let (nf1, nf2) = (n1 as f64, n2 as f64);
    let (t, df, se) = if equal_variance {
        let sp2 = ((nf1 - 1.0) * v1 + (nf2 - 1.0) * v2) / (nf1 + nf2 - 2.0);
        let se = (sp2 * (1.0 / nf1 + 1.0 / nf2)).sqrt();
        ((m1 - m2) / se, nf1 + nf2 - 2.0, se)
    } else {
        let se = (v1 / nf1 + v2 / nf2).sqrt();
        let df = (v1 / nf1 + v2 / nf2).powi(2)
            / ((v1 / nf1).powi(2) / (nf1 - 1.0) + (v2 / nf2).powi(2) / (nf2 - 1.0));
        ((m1 - m2) / se, df, se)
    };
    let p = stats::t_p_two_sided(t, df)?;
    let t_crit = stats::t_quantile(1.0 - alpha / 2.0, df)?;
    let diff = m1 - m2;

    let mut output = RawTestOutput::default();
    num(&mut output.summary, "t_statistic", t);
    num(&mut output.summary, "p_value", p);
    num(&mut output.summary, "df", df);
    num(&mut output.summary, "mean_difference", diff);
    num(&mut output.summary, "ci_lower", diff - t_crit * se);
    num(&mut output.summary, "ci_upper", diff + t_crit * se);
    boolean(&mut output.summary, "significant", p < alpha);
    boolean(&mut output.summary, "equal_variance_assumed", equal_variance);
    opt_num(&mut output.summary, "effect_size", stats::cohens_d(&a, &b));
    if let Some(d) = stats::cohens_d(&a, &b) {
        text(&mut output.summary, "effect_magnitude", stats::effect_label(d));
    }

    object(
        &mut output.details,
        "groups",
        build(|m| {
            object(m, &name_a, group_summary(&a));
            object(m, &name_b, group_summary(&b));
        }),
    );
    object(
        &mut output.details,
        "levene",
        build(|m| {
            num(m, "statistic", levene_w);
            num(m, "p_value", levene_p);
        }),
    );
    text(
        &mut output.details,
        "variant",
        if equal_variance { "pooled" } else { "welch" },
    );
    num(&mut output.details, "alpha", alpha);

    output.charts.push(charts::box_plot(
        &[(name_a.clone(), a), (name_b.clone(), b)],
        "Group Comparison",
        config.text("value_column")?,
    ));

    comparison_context(&mut output, p, alpha, &format!(
        "'{name_a}' vs '{name_b}': mean difference {diff:.4}"
    ));
    Ok(output)
}

/// Paired t-test on per-row differences.
pub fn paired_t(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let before_col = config.text("before_column")?;
    let after_col = config.text("after_column")?;
    let alpha = config.number_or("alpha", 0.05);
    let (before, after) = dataset.paired(before_col, after_col)?;
    let n = before.len();
    if n < 2 {
        return Err(EngineError::computation(
            "paired t-test needs at least 2 complete pairs",
        ));
    }

    cancel.check()?;
    let diffs: Vec<f64> = after.iter().zip(&before).map(|(a, b)| a - b).collect();
    let mean_diff = stats::mean(&diffs);
    let sd = stats::std_dev(&diffs);
    if sd <= 0.0 {
        return Err(EngineError::computation(
            "all paired differences are identical; the t statistic is undefined",
        ));
    }
    let se = sd / (n as f64).sqrt();
    let t = mean_diff / se;
    let df = (n - 1) as f64;
    let p = stats::t_p_two_sided(t, df)?;
    let t_crit = stats::t_quantile(1.0 - alpha / 2.0, df)?;
    let d = mean_diff / sd;

    let mut output = RawTestOutput::default();
    num(&mut output.summary, "t_statistic", t);
    num(&mut output.summary, "p_value", p);
    num(&mut output.summary, "df", df);
    num(&mut output.summary, "mean_difference", mean_diff);
    num(&mut output.summary, "ci_lower", mean_diff - t_crit * se);
    num(&mut output.summary, "ci_upper", mean_diff + t_crit * se);
    boolean(&mut output.summary, "significant", p < alpha);
    num(&mut output.summary, "effect_size", d);
    text(&mut output.summary, "effect_magnitude", stats::effect_label(d));

    int(&mut output.details, "n_pairs", n);
    num(&mut output.details, "before_mean", stats::mean(&before));
    num(&mut output.details, "after_mean", stats::mean(&after));
    num(&mut output.details, "alpha", alpha);

    output.charts.push(charts::box_plot(
        &[
            (before_col.to_string(), before),
            (after_col.to_string(), after),
        ],
        "Before vs After",
        "value",
    ));
    output.charts.push(charts::histogram(
        &diffs,
        "difference",
        "Distribution of Paired Differences",
    ));

    comparison_context(&mut output, p, alpha, &format!(
        "mean paired change ({after_col} - {before_col}) of {mean_diff:.4}"
    ));
    Ok(output)
}

/// One-way ANOVA with eta-squared effect size.
pub fn one_way_anova(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let alpha = config.number_or("alpha", 0.05);
    let groups = all_groups(dataset, config)?;
    let k = groups.len();
    if groups.values().any(|g| g.len() < 2) {
        return Err(EngineError::computation(
            "each group needs at least 2 observations",
        ));
    }

    cancel.check()?;
    let all: Vec<f64> = groups.values().flatten().copied().collect();
    let n = all.len() as f64;
    let grand_mean = stats::mean(&all);

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for g in groups.values() {
        let gm = stats::mean(g);
        ss_between += g.len() as f64 * (gm - grand_mean).powi(2);
        ss_within += g.iter().map(|x| (x - gm).powi(2)).sum::<f64>();
    }
    let df_between = (k - 1) as f64;
    let df_within = n - k as f64;
    if ss_within <= 0.0 {
        return Err(EngineError::computation(
            "zero within-group variance; the F statistic is undefined",
        ));
    }
    let f = (ss_between / df_between) / (ss_within / df_within);
    let p = stats::f_sf(f, df_between, df_within)?;
    let ss_total = ss_between + ss_within;
    let eta_squared = if ss_total > 0.0 { ss_between / ss_total } else { 0.0 };

    let mut output = RawTestOutput::default();
    num(&mut output.summary, "f_statistic", f);
    num(&mut output.summary, "p_value", p);
    num(&mut output.summary, "df_between", df_between);
    num(&mut output.summary, "df_within", df_within);
    boolean(&mut output.summary, "significant", p < alpha);
    num(&mut output.summary, "eta_squared", eta_squared);
    int(&mut output.summary, "group_count", k);

    object(
        &mut output.details,
        "groups",
        build(|m| {
            for (name, g) in &groups {
                object(m, name, group_summary(g));
            }
        }),
    );
    num(&mut output.details, "ss_between", ss_between);
    num(&mut output.details, "ss_within", ss_within);
    num(&mut output.details, "alpha", alpha);

    let group_vec: Vec<(String, Vec<f64>)> =
        groups.iter().map(|(n, g)| (n.clone(), g.clone())).collect();
    output.charts.push(charts::box_plot(
        &group_vec,
        "Group Comparison",
        config.text("value_column")?,
    ));

    comparison_context(&mut output, p, alpha, &format!(
        "{k} group means; eta-squared {eta_squared:.3}"
    ));
    Ok(output)
}

/// Mann-Whitney U with rank-biserial effect size.
pub fn mann_whitney(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let alpha = config.number_or("alpha", 0.05);
    let ((name_a, a), (name_b, b)) = two_groups(dataset, config)?;

    cancel.check()?;
    let (u, z, p) = stats::mann_whitney(&a, &b)?;
    let rank_biserial = 1.0 - 2.0 * u / (a.len() as f64 * b.len() as f64);

    let mut output = RawTestOutput::default();
    num(&mut output.summary, "u_statistic", u);
    num(&mut output.summary, "z_statistic", z);
    num(&mut output.summary, "p_value", p);
    boolean(&mut output.summary, "significant", p < alpha);
    num(&mut output.summary, "rank_biserial", rank_biserial);
    num(&mut output.summary, "median_1", stats::median(&a));
    num(&mut output.summary, "median_2", stats::median(&b));

    object(
        &mut output.details,
        "groups",
        build(|m| {
            object(m, &name_a, group_summary(&a));
            object(m, &name_b, group_summary(&b));
        }),
    );
    num(&mut output.details, "alpha", alpha);

    output.charts.push(charts::box_plot(
        &[(name_a.clone(), a), (name_b.clone(), b)],
        "Group Comparison (ranks)",
        config.text("value_column")?,
    ));

    comparison_context(&mut output, p, alpha, &format!(
        "'{name_a}' vs '{name_b}' medians; rank-biserial {rank_biserial:.3}"
    ));
    Ok(output)
}

/// Kruskal-Wallis with epsilon-squared effect size.
pub fn kruskal_wallis(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let alpha = config.number_or("alpha", 0.05);
    let groups = all_groups(dataset, config)?;
    let k = groups.len();

    cancel.check()?;
    let group_vec: Vec<Vec<f64>> = groups.values().cloned().collect();
    let (h, df, p) = stats::kruskal_wallis(&group_vec)?;
    let n: usize = group_vec.iter().map(Vec::len).sum();
    let epsilon_squared = if n > k {
        ((h - k as f64 + 1.0) / (n as f64 - k as f64)).max(0.0)
    } else {
        0.0
    };

    let mut output = RawTestOutput::default();
    num(&mut output.summary, "h_statistic", h);
    num(&mut output.summary, "p_value", p);
    num(&mut output.summary, "df", df);
    boolean(&mut output.summary, "significant", p < alpha);
    num(&mut output.summary, "epsilon_squared", epsilon_squared);
    int(&mut output.summary, "group_count", k);

    object(
        &mut output.details,
        "group_medians",
        build(|m| {
            for (name, g) in &groups {
                num(m, name, stats::median(g));
            }
        }),
    );
    num(&mut output.details, "alpha", alpha);

    let named: Vec<(String, Vec<f64>)> =
        groups.iter().map(|(n, g)| (n.clone(), g.clone())).collect();
    output.charts.push(charts::box_plot(
        &named,
        "Group Comparison (ranks)",
        config.text("value_column")?,
    ));

    comparison_context(&mut output, p, alpha, &format!(
        "{k} group medians; epsilon-squared {epsilon_squared:.3}"
    ));
    Ok(output)
}

/// Chi-square test of association with Cramer's V.
pub fn chi_square_association(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let row_col = config.text("row_column")?;
    let col_col = config.text("col_column")?;
    let alpha = config.number_or("alpha", 0.05);
    let pairs = dataset.label_pairs(row_col, col_col)?;
    if pairs.is_empty() {
        return Err(EngineError::computation(
            "no complete rows for the contingency table",
        ));
    }

    cancel.check()?;
    let mut row_labels: Vec<String> = Vec::new();
    let mut col_labels: Vec<String> = Vec::new();
    for (r, c) in &pairs {
        if !row_labels.contains(r) {
            row_labels.push(r.clone());
        }
        if !col_labels.contains(c) {
            col_labels.push(c.clone());
        }
    }
    row_labels.sort();
    col_labels.sort();

    let mut observed = vec![vec![0.0; col_labels.len()]; row_labels.len()];
    for (r, c) in &pairs {
        let (Some(i), Some(j)) = (
            row_labels.iter().position(|l| l == r),
            col_labels.iter().position(|l| l == c),
        ) else {
            continue;
        };
        observed[i][j] += 1.0;
    }

    let (chi2, df, p, expected) = stats::chi2_contingency(&observed)?;
    let n = pairs.len() as f64;
    let min_dim = (row_labels.len().min(col_labels.len()) - 1) as f64;
    let cramers_v = if min_dim > 0.0 { (chi2 / (n * min_dim)).sqrt() } else { 0.0 };

    let low_cells = expected.iter().flatten().filter(|&&e| e < 5.0).count();
    let total_cells = expected.len() * expected[0].len();

    let mut output = RawTestOutput::default();
    if low_cells as f64 / total_cells as f64 > 0.2 {
        output.warn(format!(
            "{low_cells} of {total_cells} expected cell counts are below 5; \
             the chi-square approximation may be unreliable"
        ));
    }

    num(&mut output.summary, "chi2_statistic", chi2);
    num(&mut output.summary, "p_value", p);
    num(&mut output.summary, "df", df);
    boolean(&mut output.summary, "significant", p < alpha);
    num(&mut output.summary, "cramers_v", cramers_v);
    int(&mut output.summary, "n", pairs.len());

    str_array(&mut output.details, "row_labels", &row_labels);
    str_array(&mut output.details, "col_labels", &col_labels);
    matrix(&mut output.details, "observed", &observed);
    matrix(&mut output.details, "expected", &expected);
    num(&mut output.details, "alpha", alpha);

    // Observed counts as grouped bars, one trace per row label.
    let row_totals: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
    output
        .charts
        .push(charts::bar(&row_labels, &row_totals, "Row Category Counts", "Count"));

    comparison_context(&mut output, p, alpha, &format!(
        "association between '{row_col}' and '{col_col}'; Cramer's V {cramers_v:.3}"
    ));
    Ok(output)
}

/// Chi-square goodness of fit against given (or uniform) probabilities.
pub fn chi_square_goodness(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let category_col = config.text("category_column")?;
    let alpha = config.number_or("alpha", 0.05);
    let labels = dataset.labels(category_col)?;
    if labels.is_empty() {
        return Err(EngineError::computation(format!(
            "no usable categories in '{category_col}'"
        )));
    }

    cancel.check()?;
    let mut counts: BTreeMap<String, f64> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0.0) += 1.0;
    }
    let categories: Vec<String> = counts.keys().cloned().collect();
    let observed: Vec<f64> = counts.values().copied().collect();
    let n: f64 = observed.iter().sum();
    let k = categories.len();
    if k < 2 {
        return Err(EngineError::computation(
            "goodness of fit needs at least 2 categories",
        ));
    }

    let probabilities: Vec<f64> = match config.get("expected_probabilities") {
        Some(serde_json::Value::Array(items)) => {
            let ps: Vec<f64> = items.iter().filter_map(|v| v.as_f64()).collect();
            if ps.len() != k {
                return Err(EngineError::configuration(format!(
                    "'expected_probabilities' must have {k} entries (one per category)"
                )));
            }
            let total: f64 = ps.iter().sum();
            if total <= 0.0 || ps.iter().any(|&p| p < 0.0) {
                return Err(EngineError::configuration(
                    "'expected_probabilities' must be non-negative and sum above 0",
                ));
            }
            ps.iter().map(|p| p / total).collect()
        }
        _ => vec![1.0 / k as f64; k],
    };

    let expected: Vec<f64> = probabilities.iter().map(|p| p * n).collect();
    let chi2: f64 = observed
        .iter()
        .zip(&expected)
        .filter(|(_, &e)| e > 0.0)
        .map(|(o, e)| (o - e).powi(2) / e)
        .sum();
    let df = (k - 1) as f64;
    let p = stats::chi2_sf(chi2, df)?;

    let low_cells = expected.iter().filter(|&&e| e < 5.0).count();
    let mut output = RawTestOutput::default();
    if low_cells as f64 / k as f64 > 0.2 {
        output.warn(format!(
            "{low_cells} of {k} expected counts are below 5; \
             the chi-square approximation may be unreliable"
        ));
    }

    num(&mut output.summary, "chi2_statistic", chi2);
    num(&mut output.summary, "p_value", p);
    num(&mut output.summary, "df", df);
    boolean(&mut output.summary, "significant", p < alpha);
    int(&mut output.summary, "n", n as usize);

    str_array(&mut output.details, "categories", &categories);
    num_array(&mut output.details, "observed", &observed);
    num_array(&mut output.details, "expected", &expected);
    num(&mut output.details, "alpha", alpha);

    output
        .charts
        .push(charts::bar(&categories, &observed, "Observed Counts", "Count"));

    comparison_context(&mut output, p, alpha, &format!(
        "observed '{category_col}' frequencies vs expected proportions"
    ));
    Ok(output)
}

fn group_summary(g: &[f64]) -> crate::result::JsonMap {
    build(|m| {
        int(m, "n", g.len());
        num(m, "mean", stats::mean(g));
        num(m, "median", stats::median(g));
        num(m, "std", stats::std_dev(g));
    })
}

fn comparison_context(output: &mut RawTestOutput, p: f64, alpha: f64, finding: &str) {
    num(&mut output.interpretation_context, "p_value", p);
    num(&mut output.interpretation_context, "alpha", alpha);
    text(
        &mut output.interpretation_context,
        "conclusion",
        if p < alpha {
            "statistically significant"
        } else {
            "not statistically significant"
        },
    );
    text(&mut output.interpretation_context, "finding", finding);
}

fn matrix(map: &mut crate::result::JsonMap, key: &str, rows: &[Vec<f64>]) {
    let value: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            serde_json::Value::Array(
                r.iter()
                    .map(|&v| crate::runners::helpers::json_num(v))
                    .collect(),
            )
        })
        .collect();
    map.insert(key.to_string(), serde_json::Value::Array(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(v: serde_json::Value) -> TestConfig {
        TestConfig::from_value(v).unwrap()
    }

    fn two_group_dataset(shift: f64) -> Dataset {
        let mut records = Vec::new();
        for i in 0..20 {
            let noise = (i % 5) as f64 * 0.1;
            records.push(json!({"strength": 50.0 + noise, "line": "A"}));
            records.push(json!({"strength": 50.0 + shift + noise, "line": "B"}));
        }
        Dataset::from_records(&records).unwrap()
    }

    #[test]
    fn separated_groups_are_significant() {
        let ds = two_group_dataset(5.0);
        let out = two_sample_t(
            &ds,
            &cfg(json!({"value_column": "strength", "group_column": "line"})),
            &Cancellation::new(),
        )
        .unwrap();
        let p = out.summary.get("p_value").and_then(|v| v.as_f64()).unwrap();
        assert!(p < 0.001);
        assert_eq!(out.summary.get("significant"), Some(&json!(true)));
    }

    #[test]
    fn identical_groups_are_not_significant() {
        let ds = two_group_dataset(0.0);
        let out = two_sample_t(
            &ds,
            &cfg(json!({"value_column": "strength", "group_column": "line"})),
            &Cancellation::new(),
        )
        .unwrap();
        let p = out.summary.get("p_value").and_then(|v| v.as_f64()).unwrap();
        assert!(p > 0.9);
    }

    #[test]
    fn zero_variance_is_a_computation_error() {
        let records: Vec<serde_json::Value> = (0..10)
            .map(|i| json!({"x": 5.0, "g": if i < 5 { "A" } else { "B" }}))
            .collect();
        let ds = Dataset::from_records(&records).unwrap();
        let err = two_sample_t(
            &ds,
            &cfg(json!({"value_column": "x", "group_column": "g"})),
            &Cancellation::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("zero variance"));
    }

    #[test]
    fn one_sample_t_confidence_interval_brackets_mean() {
        let records: Vec<serde_json::Value> =
            (0..25).map(|i| json!({"x": 10.0 + (i % 7) as f64 * 0.2})).collect();
        let ds = Dataset::from_records(&records).unwrap();
        let out = one_sample_t(
            &ds,
            &cfg(json!({"column": "x", "mu": 10.0})),
            &Cancellation::new(),
        )
        .unwrap();
        let lo = out.summary.get("ci_lower").and_then(|v| v.as_f64()).unwrap();
        let hi = out.summary.get("ci_upper").and_then(|v| v.as_f64()).unwrap();
        let mean = out.summary.get("sample_mean").and_then(|v| v.as_f64()).unwrap();
        assert!(lo < mean && mean < hi);
    }

    #[test]
    fn mann_whitney_rank_biserial_is_maximal_for_disjoint_samples() {
        let mut records = Vec::new();
        for i in 0..10 {
            records.push(json!({"x": i as f64, "g": "low"}));
            records.push(json!({"x": 100.0 + i as f64, "g": "high"}));
        }
        let ds = Dataset::from_records(&records).unwrap();
        let out = mann_whitney(
            &ds,
            &cfg(json!({"value_column": "x", "group_column": "g"})),
            &Cancellation::new(),
        )
        .unwrap();
        let r = out.summary.get("rank_biserial").and_then(|v| v.as_f64()).unwrap();
        assert!((r.abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn anova_eta_squared_in_unit_interval() {
        let mut records = Vec::new();
        for i in 0..12 {
            let g = ["A", "B", "C"][i % 3];
            records.push(json!({"y": i as f64 + (i % 3) as f64 * 4.0, "g": g}));
        }
        let ds = Dataset::from_records(&records).unwrap();
        let out = one_way_anova(
            &ds,
            &cfg(json!({"value_column": "y", "group_column": "g"})),
            &Cancellation::new(),
        )
        .unwrap();
        let eta = out.summary.get("eta_squared").and_then(|v| v.as_f64()).unwrap();
        assert!((0.0..=1.0).contains(&eta));
    }

    #[test]
    fn chi_square_goodness_uniform_default() {
        let mut records = Vec::new();
        for _ in 0..30 {
            records.push(json!({"face": "heads"}));
            records.push(json!({"face": "tails"}));
        }
        let ds = Dataset::from_records(&records).unwrap();
        let out = chi_square_goodness(
            &ds,
            &cfg(json!({"category_column": "face"})),
            &Cancellation::new(),
        )
        .unwrap();
        let chi2 = out.summary.get("chi2_statistic").and_then(|v| v.as_f64()).unwrap();
        assert!(chi2.abs() < 1e-9);
    }

    #[test]
    fn chi_square_association_warns_on_sparse_tables() {
        let mut records = Vec::new();
        for i in 0..12 {
            let shift = ["s1", "s2"][i % 2];
            let defect = ["scratch", "dent", "crack"][i % 3];
            records.push(json!({"shift": shift, "defect": defect}));
        }
        let ds = Dataset::from_records(&records).unwrap();
        let out = chi_square_association(
            &ds,
            &cfg(json!({"row_column": "shift", "col_column": "defect"})),
            &Cancellation::new(),
        )
        .unwrap();
        assert!(!out.warnings.is_empty());
    }
}
