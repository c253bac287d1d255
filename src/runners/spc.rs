//! Statistical process control charts.
//!
//! Variables charts (I-MR, X-bar/R) and attributes charts (p, np, c, u).
//! Limits are always derived from the data itself; out-of-control points
//! are flagged with the 3-sigma rule and highlighted in the chart spec.

use crate::charts;
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::errors::EngineError;
use crate::result::RawTestOutput;
use crate::runners::helpers::{boolean, int, num, num_array, text};
use crate::runners::{Cancellation, RunnerRegistry};
use crate::stats;

pub fn register_spc_runners(registry: &mut RunnerRegistry) {
    registry.register("i_mr_chart", i_mr_chart);
    registry.register("xbar_r_chart", xbar_r_chart);
    registry.register("p_chart", p_chart);
    registry.register("np_chart", np_chart);
    registry.register("c_chart", c_chart);
    registry.register("u_chart", u_chart);
}

/// Indices of points beyond the control limits (Western Electric rule 1).
fn rule1_violations(points: &[f64], ucl: f64, lcl: f64) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, &x)| x > ucl || x < lcl)
        .map(|(i, _)| i)
        .collect()
}

fn chart_summary(
    output: &mut RawTestOutput,
    center: f64,
    ucl: f64,
    lcl: f64,
    points: usize,
    violations: &[usize],
) {
    num(&mut output.summary, "center_line", center);
    num(&mut output.summary, "ucl", ucl);
    num(&mut output.summary, "lcl", lcl);
    int(&mut output.summary, "point_count", points);
    int(&mut output.summary, "violation_count", violations.len());
    boolean(&mut output.summary, "in_control", violations.is_empty());
    num(&mut output.interpretation_context, "center_line", center);
    int(
        &mut output.interpretation_context,
        "violation_count",
        violations.len(),
    );
    text(
        &mut output.interpretation_context,
        "conclusion",
        if violations.is_empty() {
            "process appears to be in statistical control"
        } else {
            "process shows points beyond the 3-sigma limits; investigate special causes"
        },
    );
}

/// Individuals and moving range chart.
pub fn i_mr_chart(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let value_col = config.text("value_column")?;
    let xs = dataset.numeric(value_col)?;
    if xs.len() < 3 {
        return Err(EngineError::computation(
            "I-MR chart needs at least 3 numeric observations",
        ));
    }

    cancel.check()?;
    let mrs = stats::moving_ranges(&xs);
    let mr_bar = stats::mean(&mrs);
    if mr_bar <= 0.0 {
        return Err(EngineError::computation(format!(
            "column '{value_col}' shows no variation; control limits are undefined"
        )));
    }
    let center = stats::mean(&xs);
    let sigma = mr_bar / stats::MR_D2;
    let (ucl, lcl) = (center + 3.0 * sigma, center - 3.0 * sigma);
    let i_violations = rule1_violations(&xs, ucl, lcl);

    let mr_ucl = stats::MR_D4 * mr_bar;
    let mr_violations = rule1_violations(&mrs, mr_ucl, 0.0);

    let mut output = RawTestOutput::default();
    chart_summary(&mut output, center, ucl, lcl, xs.len(), &i_violations);
    num(&mut output.summary, "mr_bar", mr_bar);
    num(&mut output.summary, "estimated_sigma", sigma);

    num_array(&mut output.details, "individuals", &xs);
    num_array(&mut output.details, "moving_ranges", &mrs);
    num(&mut output.details, "mr_ucl", mr_ucl);
    int(&mut output.details, "mr_violation_count", mr_violations.len());

    output.charts.push(charts::control_chart(
        &xs,
        center,
        ucl,
        lcl,
        "Individuals Chart",
        value_col,
        &i_violations,
    ));
    output.charts.push(charts::control_chart(
        &mrs,
        mr_bar,
        mr_ucl,
        0.0,
        "Moving Range Chart",
        "Moving range",
        &mr_violations,
    ));
    Ok(output)
}

/// X-bar and R chart over fixed-size subgroups.
pub fn xbar_r_chart(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let value_col = config.text("value_column")?;
    let subgroup_size = config.usize_or("subgroup_size", 5);
    let xs = dataset.numeric(value_col)?;

    let (a2, d3, d4, _d2) = stats::xbar_r_constants(subgroup_size).ok_or_else(|| {
        EngineError::computation(format!(
            "no control constants for subgroup size {subgroup_size} (supported: 2-10)"
        ))
    })?;

    cancel.check()?;
    let subgroups: Vec<&[f64]> = xs.chunks_exact(subgroup_size).collect();
    if subgroups.len() < 2 {
        return Err(EngineError::computation(format!(
            "need at least 2 complete subgroups of size {subgroup_size}; have {} observations",
            xs.len()
        )));
    }

    let mut output = RawTestOutput::default();
    let remainder = xs.len() % subgroup_size;
    if remainder != 0 {
        output.warn(format!(
            "{remainder} trailing observation(s) do not fill a subgroup and were dropped"
        ));
    }

    let xbars: Vec<f64> = subgroups.iter().map(|g| stats::mean(g)).collect();
    let ranges: Vec<f64> = subgroups
        .iter()
        .map(|g| {
            let max = g.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = g.iter().copied().fold(f64::INFINITY, f64::min);
            max - min
        })
        .collect();
    let xbar_bar = stats::mean(&xbars);
    let r_bar = stats::mean(&ranges);
    if r_bar <= 0.0 {
        return Err(EngineError::computation(format!(
            "column '{value_col}' shows no within-subgroup variation; control limits are undefined"
        )));
    }

    let (xbar_ucl, xbar_lcl) = (xbar_bar + a2 * r_bar, xbar_bar - a2 * r_bar);
    let (r_ucl, r_lcl) = (d4 * r_bar, d3 * r_bar);
    let xbar_violations = rule1_violations(&xbars, xbar_ucl, xbar_lcl);
    let r_violations = rule1_violations(&ranges, r_ucl, r_lcl);

    chart_summary(
        &mut output,
        xbar_bar,
        xbar_ucl,
        xbar_lcl,
        xbars.len(),
        &xbar_violations,
    );
    num(&mut output.summary, "r_bar", r_bar);
    int(&mut output.summary, "subgroup_size", subgroup_size);

    num_array(&mut output.details, "subgroup_means", &xbars);
    num_array(&mut output.details, "subgroup_ranges", &ranges);
    num(&mut output.details, "r_ucl", r_ucl);
    num(&mut output.details, "r_lcl", r_lcl);
    int(&mut output.details, "r_violation_count", r_violations.len());

    output.charts.push(charts::control_chart(
        &xbars,
        xbar_bar,
        xbar_ucl,
        xbar_lcl,
        "X-bar Chart",
        value_col,
        &xbar_violations,
    ));
    output.charts.push(charts::control_chart(
        &ranges,
        r_bar,
        r_ucl,
        r_lcl,
        "R Chart",
        "Range",
        &r_violations,
    ));
    Ok(output)
}

/// p chart for proportion defective with per-sample limits.
pub fn p_chart(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let defective_col = config.text("defective_column")?;
    let size_col = config.text("sample_size_column")?;
    let (defectives, sizes) = dataset.paired(defective_col, size_col)?;
    if defectives.is_empty() {
        return Err(EngineError::computation("no complete sample rows"));
    }
    if defectives
        .iter()
        .zip(&sizes)
        .any(|(d, n)| *d < 0.0 || *n <= 0.0 || d > n)
    {
        return Err(EngineError::computation(
            "defective counts must lie within their sample sizes",
        ));
    }

    cancel.check()?;
    let total_defective: f64 = defectives.iter().sum();
    let total_inspected: f64 = sizes.iter().sum();
    let p_bar = total_defective / total_inspected;
    let proportions: Vec<f64> = defectives.iter().zip(&sizes).map(|(d, n)| d / n).collect();

    // Per-sample limits; the displayed limits use the average sample size.
    let violations: Vec<usize> = proportions
        .iter()
        .zip(&sizes)
        .enumerate()
        .filter(|(_, (p, n))| {
            let sigma = (p_bar * (1.0 - p_bar) / **n).sqrt();
            **p > p_bar + 3.0 * sigma || **p < (p_bar - 3.0 * sigma).max(0.0)
        })
        .map(|(i, _)| i)
        .collect();

    let n_bar = total_inspected / sizes.len() as f64;
    let sigma_bar = (p_bar * (1.0 - p_bar) / n_bar).sqrt();
    let (ucl, lcl) = (p_bar + 3.0 * sigma_bar, (p_bar - 3.0 * sigma_bar).max(0.0));

    let mut output = RawTestOutput::default();
    chart_summary(&mut output, p_bar, ucl, lcl, proportions.len(), &violations);
    num(&mut output.summary, "total_inspected", total_inspected);

    num_array(&mut output.details, "proportions", &proportions);
    num_array(&mut output.details, "sample_sizes", &sizes);
    boolean(&mut output.details, "variable_limits", true);

    output.charts.push(charts::control_chart(
        &proportions,
        p_bar,
        ucl,
        lcl,
        "p Chart",
        "Proportion defective",
        &violations,
    ));
    Ok(output)
}

/// np chart for defective counts at a constant sample size.
pub fn np_chart(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let defective_col = config.text("defective_column")?;
    let sample_size = config
        .integer_opt("sample_size")
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| EngineError::configuration("'sample_size' must be a positive integer"))?
        as f64;
    let defectives = dataset.numeric(defective_col)?;
    if defectives.is_empty() {
        return Err(EngineError::computation("no defective counts"));
    }
    if defectives.iter().any(|&d| d < 0.0 || d > sample_size) {
        return Err(EngineError::computation(
            "defective counts must lie within the sample size",
        ));
    }

    cancel.check()?;
    let np_bar = stats::mean(&defectives);
    let p_bar = np_bar / sample_size;
    let sigma = (np_bar * (1.0 - p_bar)).sqrt();
    let (ucl, lcl) = (np_bar + 3.0 * sigma, (np_bar - 3.0 * sigma).max(0.0));
    let violations = rule1_violations(&defectives, ucl, lcl);

    let mut output = RawTestOutput::default();
    chart_summary(&mut output, np_bar, ucl, lcl, defectives.len(), &violations);
    num(&mut output.summary, "p_bar", p_bar);

    num_array(&mut output.details, "defectives", &defectives);
    num(&mut output.details, "sample_size", sample_size);

    output.charts.push(charts::control_chart(
        &defectives,
        np_bar,
        ucl,
        lcl,
        "np Chart",
        "Defective count",
        &violations,
    ));
    Ok(output)
}

/// c chart for defect counts per inspection unit.
pub fn c_chart(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let defects_col = config.text("defects_column")?;
    let counts = dataset.numeric(defects_col)?;
    if counts.is_empty() {
        return Err(EngineError::computation("no defect counts"));
    }
    if counts.iter().any(|&c| c < 0.0) {
        return Err(EngineError::computation("defect counts must be non-negative"));
    }

    cancel.check()?;
    let c_bar = stats::mean(&counts);
    if c_bar <= 0.0 {
        return Err(EngineError::computation(
            "all defect counts are zero; control limits are undefined",
        ));
    }
    let sigma = c_bar.sqrt();
    let (ucl, lcl) = (c_bar + 3.0 * sigma, (c_bar - 3.0 * sigma).max(0.0));
    let violations = rule1_violations(&counts, ucl, lcl);

    let mut output = RawTestOutput::default();
    chart_summary(&mut output, c_bar, ucl, lcl, counts.len(), &violations);
    num_array(&mut output.details, "counts", &counts);

    output.charts.push(charts::control_chart(
        &counts,
        c_bar,
        ucl,
        lcl,
        "c Chart",
        "Defect count",
        &violations,
    ));
    Ok(output)
}

/// u chart for defects per unit with varying unit counts.
pub fn u_chart(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let defects_col = config.text("defects_column")?;
    let units_col = config.text("units_column")?;
    let (counts, units) = dataset.paired(defects_col, units_col)?;
    if counts.is_empty() {
        return Err(EngineError::computation("no complete sample rows"));
    }
    if counts.iter().any(|&c| c < 0.0) || units.iter().any(|&u| u <= 0.0) {
        return Err(EngineError::computation(
            "defect counts must be non-negative and unit counts positive",
        ));
    }

    cancel.check()?;
    let total_defects: f64 = counts.iter().sum();
    let total_units: f64 = units.iter().sum();
    let u_bar = total_defects / total_units;
    if u_bar <= 0.0 {
        return Err(EngineError::computation(
            "all defect counts are zero; control limits are undefined",
        ));
    }
    let rates: Vec<f64> = counts.iter().zip(&units).map(|(c, u)| c / u).collect();

    let violations: Vec<usize> = rates
        .iter()
        .zip(&units)
        .enumerate()
        .filter(|(_, (r, u))| {
            let sigma = (u_bar / **u).sqrt();
            **r > u_bar + 3.0 * sigma || **r < (u_bar - 3.0 * sigma).max(0.0)
        })
        .map(|(i, _)| i)
        .collect();

    let n_bar = total_units / units.len() as f64;
    let sigma_bar = (u_bar / n_bar).sqrt();
    let (ucl, lcl) = (u_bar + 3.0 * sigma_bar, (u_bar - 3.0 * sigma_bar).max(0.0));

    let mut output = RawTestOutput::default();
    chart_summary(&mut output, u_bar, ucl, lcl, rates.len(), &violations);
    num_array(&mut output.details, "rates", &rates);
    num_array(&mut output.details, "units", &units);
    boolean(&mut output.details, "variable_limits", true);

    output.charts.push(charts::control_chart(
        &rates,
        u_bar,
        ucl,
        lcl,
        "u Chart",
        "Defects per unit",
        &violations,
    ));
    Ok(output)
}
