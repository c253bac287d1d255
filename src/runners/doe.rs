//! Two-level factorial design generation and effects analysis.
//!
//! Design generators read a factor table from the dataset (one row per
//! factor: name, low setting, high setting) and emit a coded run list with
//! a seeded, reproducible randomized run order.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde_json::Value;

use crate::charts;
use crate::config::TestConfig;
use crate::dataset::Dataset;
use crate::errors::EngineError;
use crate::result::RawTestOutput;
use crate::runners::helpers::{array, build, int, num, str_array, text};
use crate::runners::{Cancellation, RunnerRegistry};
use crate::stats;

pub fn register_doe_runners(registry: &mut RunnerRegistry) {
    registry.register("full_factorial", full_factorial);
    registry.register("fractional_factorial", fractional_factorial);
    registry.register("doe_analysis", doe_analysis);
}

const DEFAULT_SEED: u64 = 42;
const MAX_FACTORS: usize = 10;

struct Factor {
    name: String,
    low: f64,
    high: f64,
}

fn read_factor_table(
    dataset: &Dataset,
    config: &TestConfig,
    min_factors: usize,
) -> Result<Vec<Factor>, EngineError> {
    let factor_col = config.text("factor_column")?;
    let low_col = config.text("low_column")?;
    let high_col = config.text("high_column")?;
    let rows = dataset.rows_with_label(factor_col, &[low_col, high_col])?;

    let mut factors = Vec::with_capacity(rows.len());
    for (name, values) in rows {
        if factors.iter().any(|f: &Factor| f.name == name) {
            return Err(EngineError::computation(format!(
                "duplicate factor name '{name}' in the factor table"
            )));
        }
        let (low, high) = (values[0], values[1]);
        if low >= high {
            return Err(EngineError::computation(format!(
                "factor '{name}': low setting ({low}) must be below high setting ({high})"
            )));
        }
        factors.push(Factor { name, low, high });
    }
    if factors.len() < min_factors {
        return Err(EngineError::computation(format!(
            "design needs at least {min_factors} factors; the factor table has {}",
            factors.len()
        )));
    }
    if factors.len() > MAX_FACTORS {
        return Err(EngineError::computation(format!(
            "design supports at most {MAX_FACTORS} factors; the factor table has {}",
            factors.len()
        )));
    }
    Ok(factors)
}

/// Coded levels for the standard-order run `index` over `k` base factors.
fn coded_levels(index: usize, k: usize) -> Vec<i8> {
    (0..k)
        .map(|j| if (index >> j) & 1 == 1 { 1 } else { -1 })
        .collect()
}

fn design_output(
    factors: &[Factor],
    coded_runs: Vec<Vec<i8>>,
    replicates: usize,
    seed: u64,
    design_name: &str,
    generator: Option<String>,
) -> RawTestOutput {
    let base_runs = coded_runs.len();
    let total_runs = base_runs * replicates;

    // Randomized, reproducible run order.
    let mut order: Vec<usize> = (0..total_runs).collect();
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut runs: Vec<Value> = Vec::with_capacity(total_runs);
    for (position, &std_index) in order.iter().enumerate() {
        let pattern = &coded_runs[std_index % base_runs];
        runs.push(Value::Object(build(|m| {
            int(m, "run_order", position + 1);
            int(m, "std_order", std_index + 1);
            int(m, "replicate", std_index / base_runs + 1);
            for (factor, &level) in factors.iter().zip(pattern) {
                num(
                    m,
                    &factor.name,
                    if level > 0 { factor.high } else { factor.low },
                );
                num(m, &format!("{}_coded", factor.name), level as f64);
            }
        })));
    }

    let mut output = RawTestOutput::default();
    int(&mut output.summary, "factor_count", factors.len());
    int(&mut output.summary, "run_count", total_runs);
    int(&mut output.summary, "replicates", replicates);
    int(&mut output.summary, "seed", seed as usize);
    text(&mut output.summary, "design", design_name);
    if let Some(g) = &generator {
        text(&mut output.summary, "generator", g.clone());
    }

    array(&mut output.details, "runs", runs);
    let names: Vec<String> = factors.iter().map(|f| f.name.clone()).collect();
    str_array(&mut output.details, "factors", &names);

    text(&mut output.interpretation_context, "design", design_name);
    int(&mut output.interpretation_context, "run_count", total_runs);
    text(
        &mut output.interpretation_context,
        "recommendation",
        "Execute the runs in the randomized run order to guard against \
         time-ordered confounding.",
    );
    output
}

/// Full 2^k factorial design.
pub fn full_factorial(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let factors = read_factor_table(dataset, config, 2)?;
    let replicates = config.usize_or("replicates", 1);
    let seed = config
        .integer_opt("seed")
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(DEFAULT_SEED);

    cancel.check()?;
    let k = factors.len();
    let coded: Vec<Vec<i8>> = (0..1usize << k).map(|i| coded_levels(i, k)).collect();
    Ok(design_output(
        &factors,
        coded,
        replicates,
        seed,
        &format!("full factorial 2^{k}"),
        None,
    ))
}

/// Half-fraction 2^(k-1) design with the last factor aliased to the product
/// of the base factors.
pub fn fractional_factorial(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let factors = read_factor_table(dataset, config, 3)?;
    let replicates = config.usize_or("replicates", 1);
    let seed = config
        .integer_opt("seed")
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(DEFAULT_SEED);

    cancel.check()?;
    let k = factors.len();
    let base = k - 1;
    let coded: Vec<Vec<i8>> = (0..1usize << base)
        .map(|i| {
            let mut levels = coded_levels(i, base);
            let product: i8 = levels.iter().product();
            levels.push(product);
            levels
        })
        .collect();

    let base_names: String = factors[..base]
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join("*");
    let generator = format!("{} = {base_names}", factors[base].name);
    Ok(design_output(
        &factors,
        coded,
        replicates,
        seed,
        &format!("fractional factorial 2^({k}-1)"),
        Some(generator),
    ))
}

/// Main and two-way interaction effects from a completed two-level design.
pub fn doe_analysis(
    dataset: &Dataset,
    config: &TestConfig,
    cancel: &Cancellation,
) -> Result<RawTestOutput, EngineError> {
    let response_col = config.text("response_column")?;
    let factor_cols = config.text_list("factor_columns")?;

    let mut all_cols = factor_cols.clone();
    all_cols.push(response_col.to_string());
    let rows = dataset.matrix(&all_cols)?;
    if rows.len() < 4 {
        return Err(EngineError::computation(
            "effects analysis needs at least 4 complete runs",
        ));
    }
    let response: Vec<f64> = rows.iter().map(|r| r[factor_cols.len()]).collect();

    // Recode each factor column to -1/+1 on its observed min/max.
    cancel.check()?;
    let mut coded: Vec<Vec<f64>> = Vec::with_capacity(factor_cols.len());
    for (j, col) in factor_cols.iter().enumerate() {
        let values: Vec<f64> = rows.iter().map(|r| r[j]).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max <= min {
            return Err(EngineError::computation(format!(
                "factor '{col}' is constant across the runs"
            )));
        }
        let mid = (max + min) / 2.0;
        let half = (max - min) / 2.0;
        coded.push(values.iter().map(|v| (v - mid) / half).collect());
    }

    let mut effects: Vec<(String, f64)> = Vec::new();
    for (name, levels) in factor_cols.iter().zip(&coded) {
        effects.push((name.clone(), contrast_effect(levels, &response)?));
    }
    for i in 0..coded.len() {
        for j in (i + 1)..coded.len() {
            let interaction: Vec<f64> = coded[i]
                .iter()
                .zip(&coded[j])
                .map(|(a, b)| a * b)
                .collect();
            let name = format!("{}*{}", factor_cols[i], factor_cols[j]);
            // Interactions can be confounded in fractional designs; a
            // one-level interaction column is skipped, not an error.
            if interaction.iter().any(|&v| v > 0.0) && interaction.iter().any(|&v| v < 0.0) {
                effects.push((name, contrast_effect(&interaction, &response)?));
            }
        }
    }
    effects.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));

    let labels: Vec<String> = effects.iter().map(|(n, _)| n.clone()).collect();
    let magnitudes: Vec<f64> = effects.iter().map(|(_, e)| e.abs()).collect();
    let total: f64 = magnitudes.iter().sum::<f64>().max(f64::MIN_POSITIVE);
    let mut cumulative = Vec::with_capacity(magnitudes.len());
    let mut running = 0.0;
    for m in &magnitudes {
        running += m;
        cumulative.push(running / total * 100.0);
    }

    let effect_rows: Vec<Value> = effects
        .iter()
        .map(|(name, effect)| {
            Value::Object(build(|m| {
                text(m, "term", name.clone());
                num(m, "effect", *effect);
                num(m, "abs_effect", effect.abs());
            }))
        })
        .collect();

    let mut output = RawTestOutput::default();
    let (top_name, top_effect) = &effects[0];
    text(&mut output.summary, "strongest_term", top_name.clone());
    num(&mut output.summary, "strongest_effect", *top_effect);
    int(&mut output.summary, "effect_count", effects.len());
    num(&mut output.summary, "grand_mean", stats::mean(&response));
    int(&mut output.summary, "run_count", response.len());

    array(&mut output.details, "effects", effect_rows);

    output.charts.push(charts::pareto(
        &labels,
        &magnitudes,
        &cumulative,
        "Pareto of Effects",
        "|effect|",
    ));

    text(&mut output.interpretation_context, "response", response_col);
    text(
        &mut output.interpretation_context,
        "strongest_term",
        top_name.clone(),
    );
    text(
        &mut output.interpretation_context,
        "finding",
        format!(
            "moving '{top_name}' from its low to high setting shifts '{response_col}' by {top_effect:.4} on average"
        ),
    );
    Ok(output)
}

/// Average response at the high level minus the low level.
fn contrast_effect(levels: &[f64], response: &[f64]) -> Result<f64, EngineError> {
    let mut high = Vec::new();
    let mut low = Vec::new();
    for (&l, &y) in levels.iter().zip(response) {
        if l > 0.0 {
            high.push(y);
        } else if l < 0.0 {
            low.push(y);
        }
    }
    if high.is_empty() || low.is_empty() {
        return Err(EngineError::computation(
            "a contrast needs observations at both levels",
        ));
    }
    Ok(stats::mean(&high) - stats::mean(&low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg(v: serde_json::Value) -> TestConfig {
        TestConfig::from_value(v).unwrap()
    }

    fn factor_table() -> Dataset {
        let records = vec![
            json!({"factor": "temperature", "low": 150.0, "high": 180.0}),
            json!({"factor": "pressure", "low": 1.0, "high": 2.0}),
            json!({"factor": "time", "low": 30.0, "high": 45.0}),
        ];
        Dataset::from_records(&records).unwrap()
    }

    fn design_cfg() -> TestConfig {
        cfg(json!({
            "factor_column": "factor",
            "low_column": "low",
            "high_column": "high",
        }))
    }

    #[test]
    fn full_factorial_enumerates_all_runs() {
        let ds = factor_table();
        let out = full_factorial(&ds, &design_cfg(), &Cancellation::new()).unwrap();
        assert_eq!(out.summary.get("run_count"), Some(&json!(8)));
        let runs = out.details.get("runs").and_then(|v| v.as_array()).unwrap();
        assert_eq!(runs.len(), 8);
    }

    #[test]
    fn run_order_is_reproducible_for_a_seed() {
        let ds = factor_table();
        let a = full_factorial(&ds, &design_cfg(), &Cancellation::new()).unwrap();
        let b = full_factorial(&ds, &design_cfg(), &Cancellation::new()).unwrap();
        assert_eq!(a.details.get("runs"), b.details.get("runs"));

        let other = cfg(json!({
            "factor_column": "factor",
            "low_column": "low",
            "high_column": "high",
            "seed": 7,
        }));
        let c = full_factorial(&ds, &other, &Cancellation::new()).unwrap();
        assert_ne!(a.details.get("runs"), c.details.get("runs"));
    }

    #[test]
    fn half_fraction_halves_the_run_count() {
        let ds = factor_table();
        let out = fractional_factorial(&ds, &design_cfg(), &Cancellation::new()).unwrap();
        assert_eq!(out.summary.get("run_count"), Some(&json!(4)));
        let generator = out.summary.get("generator").and_then(|v| v.as_str()).unwrap();
        assert!(generator.starts_with("time ="));
    }

    #[test]
    fn inverted_levels_are_rejected() {
        let records = vec![
            json!({"factor": "a", "low": 5.0, "high": 1.0}),
            json!({"factor": "b", "low": 0.0, "high": 1.0}),
        ];
        let ds = Dataset::from_records(&records).unwrap();
        let err = full_factorial(&ds, &design_cfg(), &Cancellation::new()).unwrap_err();
        assert!(err.to_string().contains("below"));
    }

    #[test]
    fn effects_analysis_ranks_the_dominant_factor() {
        // y = 10 + 4*A + 1*B over a replicated 2^2 design.
        let mut records = Vec::new();
        for &a in &[-1.0, 1.0] {
            for &b in &[-1.0, 1.0] {
                for r in 0..2 {
                    let y = 10.0 + 4.0 * a + 1.0 * b + r as f64 * 0.01;
                    records.push(json!({"A": a, "B": b, "y": y}));
                }
            }
        }
        let ds = Dataset::from_records(&records).unwrap();
        let out = doe_analysis(
            &ds,
            &cfg(json!({"response_column": "y", "factor_columns": ["A", "B"]})),
            &Cancellation::new(),
        )
        .unwrap();
        assert_eq!(out.summary.get("strongest_term"), Some(&json!("A")));
        let effect = out.summary.get("strongest_effect").and_then(|v| v.as_f64()).unwrap();
        assert!((effect - 8.0).abs() < 0.1);
    }
}
