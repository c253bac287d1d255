//! Process capability analysis against specification limits.

use crate::charts;
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::errors::EngineError;
use crate::result::RawTestOutput;
use crate::runners::helpers::{boolean, int, num, opt_num, text};
use crate::runners::{Cancellation, RunnerRegistry};
use crate::stats;

pub fn register_capability_runners(registry: &mut RunnerRegistry) {
    registry.register("capability_normal", capability_normal);
}

/// Short-term (within) and long-term (overall) capability indices for a
/// normally distributed characteristic.
///
/// Within-subgroup sigma comes from the average moving range (subgroup size
/// 1) or the average subgroup range over d2. Cp/Cpk use within sigma,
/// Pp/Ppk use overall sigma.
pub fn capability_normal(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let value_col = config.text("value_column")?;
    let lsl = config.number_opt("lsl");
    let usl = config.number_opt("usl");
    let target = config.number_opt("target");
    let subgroup_size = config.usize_or("subgroup_size", 1);
    let xs = dataset.numeric(value_col)?;
    let n = xs.len();
    if n < 2 {
        return Err(EngineError::computation(
            "capability analysis needs at least 2 numeric observations",
        ));
    }

    cancel.check()?;
    let mean = stats::mean(&xs);
    let overall_sigma = stats::std_dev(&xs);
    if overall_sigma <= 0.0 {
        return Err(EngineError::computation(format!(
            "column '{value_col}' has zero variance; capability indices are undefined"
        )));
    }

    let within_sigma = if subgroup_size <= 1 {
        let mr_bar = stats::mean(&stats::moving_ranges(&xs));
        mr_bar / stats::MR_D2
    } else {
        let (_, _, _, d2) = stats::xbar_r_constants(subgroup_size).ok_or_else(|| {
            EngineError::computation(format!(
                "no capability constants for subgroup size {subgroup_size} (supported: 2-10)"
            ))
        })?;
        let ranges: Vec<f64> = xs
            .chunks_exact(subgroup_size)
            .map(|g| {
                let max = g.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = g.iter().copied().fold(f64::INFINITY, f64::min);
                max - min
            })
            .collect();
        if ranges.is_empty() {
            return Err(EngineError::computation(format!(
                "need at least one complete subgroup of size {subgroup_size}"
            )));
        }
        stats::mean(&ranges) / d2
    };
    if within_sigma <= 0.0 {
        return Err(EngineError::computation(format!(
            "column '{value_col}' shows no within-subgroup variation; capability indices are undefined"
        )));
    }

    cancel.check()?;
    let cp = match (lsl, usl) {
        (Some(l), Some(u)) => Some((u - l) / (6.0 * within_sigma)),
        _ => None,
    };
    let pp = match (lsl, usl) {
        (Some(l), Some(u)) => Some((u - l) / (6.0 * overall_sigma)),
        _ => None,
    };
    let cpu = usl.map(|u| (u - mean) / (3.0 * within_sigma));
    let cpl = lsl.map(|l| (mean - l) / (3.0 * within_sigma));
    let cpk = min_opt(cpu, cpl);
    let ppu = usl.map(|u| (u - mean) / (3.0 * overall_sigma));
    let ppl = lsl.map(|l| (mean - l) / (3.0 * overall_sigma));
    let ppk = min_opt(ppu, ppl);

    // Expected fallout from the overall fit; observed from the raw counts.
    let prob_above = usl.map_or(0.0, |u| stats::normal_sf((u - mean) / overall_sigma));
    let prob_below = lsl.map_or(0.0, |l| stats::normal_cdf((l - mean) / overall_sigma));
    let prob_out = (prob_above + prob_below).clamp(0.0, 1.0);
    let expected_ppm = prob_out * 1e6;
    let observed_out = xs
        .iter()
        .filter(|&&x| usl.is_some_and(|u| x > u) || lsl.is_some_and(|l| x < l))
        .count();
    let observed_ppm = observed_out as f64 / n as f64 * 1e6;

    let z_bench = if prob_out > 0.0 && prob_out < 1.0 {
        stats::normal_quantile(1.0 - prob_out)
    } else if prob_out <= 0.0 {
        6.0 // fallout below measurable resolution
    } else {
        0.0
    };
    let sigma_level = z_bench + 1.5;

    let rating = match cpk.or(ppk) {
        Some(k) if k >= 2.0 => "world_class",
        Some(k) if k >= 1.33 => "capable",
        Some(k) if k >= 1.0 => "marginal",
        Some(_) => "not_capable",
        None => "unrated",
    };

    let mut output = RawTestOutput::default();
    if n < 30 {
        output.warn(format!(
            "only {n} observations; capability estimates are unstable below 30"
        ));
    }

    opt_num(&mut output.summary, "cp", cp);
    opt_num(&mut output.summary, "cpk", cpk);
    opt_num(&mut output.summary, "pp", pp);
    opt_num(&mut output.summary, "ppk", ppk);
    num(&mut output.summary, "mean", mean);
    num(&mut output.summary, "within_sigma", within_sigma);
    num(&mut output.summary, "overall_sigma", overall_sigma);
    num(&mut output.summary, "expected_ppm", expected_ppm);
    num(&mut output.summary, "observed_ppm", observed_ppm);
    num(&mut output.summary, "z_bench", z_bench);
    num(&mut output.summary, "sigma_level", sigma_level);
    text(&mut output.summary, "rating", rating);
    int(&mut output.summary, "n", n);

    opt_num(&mut output.details, "lsl", lsl);
    opt_num(&mut output.details, "usl", usl);
    opt_num(&mut output.details, "target", target);
    opt_num(&mut output.details, "cpu", cpu);
    opt_num(&mut output.details, "cpl", cpl);
    int(&mut output.details, "subgroup_size", subgroup_size);
    int(&mut output.details, "observed_out_of_spec", observed_out);
    boolean(&mut output.details, "two_sided", lsl.is_some() && usl.is_some());

    let mut hist = charts::histogram(&xs, value_col, &format!("Capability - {value_col}"));
    if let Some(l) = lsl {
        hist.lines.push(charts::RefLine { label: "LSL".into(), value: l });
    }
    if let Some(u) = usl {
        hist.lines.push(charts::RefLine { label: "USL".into(), value: u });
    }
    if let Some(t) = target {
        hist.lines.push(charts::RefLine { label: "Target".into(), value: t });
    }
    output.charts.push(hist);

    text(&mut output.interpretation_context, "rating", rating);
    opt_num(&mut output.interpretation_context, "cpk", cpk);
    num(&mut output.interpretation_context, "sigma_level", sigma_level);
    num(&mut output.interpretation_context, "expected_ppm", expected_ppm);
    text(
        &mut output.interpretation_context,
        "recommendation",
        match rating {
            "world_class" => "Process is world-class; maintain current controls.",
            "capable" => "Process is capable; monitor for drift.",
            "marginal" => "Process is marginally capable; reduce variation or re-center.",
            "not_capable" => {
                "Process is not capable; expect significant out-of-spec output. \
                 Reduce variation and re-center toward the target."
            }
            _ => "No two-sided index available; interpret one-sided indices with care.",
        },
    );
    Ok(output)
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(v: serde_json::Value) -> TestConfig {
        TestConfig::from_value(v).unwrap()
    }

    fn stable_process() -> Dataset {
        // Tight, centered process between 9.7 and 10.3.
        let records: Vec<serde_json::Value> = (0..40)
            .map(|i| json!({"diameter": 10.0 + ((i % 7) as f64 - 3.0) * 0.1}))
            .collect();
        Dataset::from_records(&records).unwrap()
    }

    #[test]
    fn centered_tight_process_is_capable() {
        let ds = stable_process();
        let out = capability_normal(
            &ds,
            &cfg(json!({"value_column": "diameter", "lsl": 8.0, "usl": 12.0})),
            &Cancellation::new(),
        )
        .unwrap();
        let cpk = out.summary.get("cpk").and_then(|v| v.as_f64()).unwrap();
        assert!(cpk > 1.33, "cpk = {cpk}");
        assert_eq!(out.summary.get("rating"), Some(&json!("world_class")));
    }

    #[test]
    fn zero_variance_is_a_computation_error() {
        let records: Vec<serde_json::Value> =
            (0..15).map(|_| json!({"diameter": 10.0})).collect();
        let ds = Dataset::from_records(&records).unwrap();
        let err = capability_normal(
            &ds,
            &cfg(json!({"value_column": "diameter", "lsl": 9.0, "usl": 11.0})),
            &Cancellation::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("zero variance"));
    }

    #[test]
    fn one_sided_spec_uses_the_single_index() {
        let ds = stable_process();
        let out = capability_normal(
            &ds,
            &cfg(json!({"value_column": "diameter", "usl": 10.5})),
            &Cancellation::new(),
        )
        .unwrap();
        assert_eq!(out.summary.get("cp"), Some(&serde_json::Value::Null));
        assert!(out.summary.get("cpk").and_then(|v| v.as_f64()).is_some());
    }
}
