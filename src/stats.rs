//! Numeric kernels shared by all test runners.
//!
//! Sample moments, rank statistics, ordinary least squares, and the
//! distribution tail probabilities behind every p-value in the engine.
//! All kernels take cleaned slices (no NaN; the dataset layer guarantees
//! this) and report degenerate inputs as `Computation` errors.

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::errors::EngineError;

// ============================================================================
// SAMPLE MOMENTS
// ============================================================================

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance (n - 1 denominator). Zero for fewer than two points.
pub fn variance(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

pub fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

/// Percentile with linear interpolation between order statistics.
pub fn percentile(xs: &[f64], q: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

pub fn median(xs: &[f64]) -> f64 {
    percentile(xs, 50.0)
}

/// Most frequent value and its count.
pub fn mode(xs: &[f64]) -> Option<(f64, usize)> {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &x in xs {
        match counts.iter_mut().find(|(v, _)| *v == x) {
            Some((_, c)) => *c += 1,
            None => counts.push((x, 1)),
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.total_cmp(&a.0)))
}

/// Bias-corrected sample skewness (adjusted Fisher-Pearson).
pub fn skewness(xs: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 3 {
        return None;
    }
    let m = mean(xs);
    let m2 = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n as f64;
    if m2 <= 0.0 {
        return None;
    }
    let m3 = xs.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n as f64;
    let g1 = m3 / m2.powf(1.5);
    let nf = n as f64;
    Some(g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0))
}

/// Bias-corrected excess kurtosis.
pub fn kurtosis(xs: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 4 {
        return None;
    }
    let m = mean(xs);
    let m2 = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n as f64;
    if m2 <= 0.0 {
        return None;
    }
    let m4 = xs.iter().map(|x| (x - m).powi(4)).sum::<f64>() / n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    let nf = n as f64;
    Some(((nf + 1.0) * g2 + 6.0) * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0)))
}

// ============================================================================
// DISTRIBUTION TAILS
// ============================================================================

fn dist_err(which: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::computation(format!("invalid {which} distribution parameters: {e}"))
}

pub fn normal_cdf(z: f64) -> f64 {
    // Standard normal parameters are always valid.
    match Normal::new(0.0, 1.0) {
        Ok(n) => n.cdf(z),
        Err(_) => f64::NAN,
    }
}

pub fn normal_sf(z: f64) -> f64 {
    1.0 - normal_cdf(z)
}

pub fn normal_quantile(p: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(n) => n.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

/// Two-sided p-value for a t statistic.
pub fn t_p_two_sided(t: f64, df: f64) -> Result<f64, EngineError> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| dist_err("Student's t", e))?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// Upper-tail quantile of Student's t (for confidence intervals).
pub fn t_quantile(p: f64, df: f64) -> Result<f64, EngineError> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| dist_err("Student's t", e))?;
    Ok(dist.inverse_cdf(p))
}

pub fn chi2_sf(x: f64, df: f64) -> Result<f64, EngineError> {
    let dist = ChiSquared::new(df).map_err(|e| dist_err("chi-squared", e))?;
    Ok((1.0 - dist.cdf(x.max(0.0))).clamp(0.0, 1.0))
}

pub fn f_sf(f: f64, df1: f64, df2: f64) -> Result<f64, EngineError> {
    let dist = FisherSnedecor::new(df1, df2).map_err(|e| dist_err("F", e))?;
    Ok((1.0 - dist.cdf(f.max(0.0))).clamp(0.0, 1.0))
}

// ============================================================================
// RANKS
// ============================================================================

/// Midranks (1-based, ties averaged) plus the tie-correction term
/// `sum(t^3 - t)` over tie groups.
pub fn ranks(xs: &[f64]) -> (Vec<f64>, f64) {
    let n = xs.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));
    let mut out = vec![0.0; n];
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && xs[order[j + 1]] == xs[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            out[idx] = rank;
        }
        let t = (j - i + 1) as f64;
        tie_term += t * t * t - t;
        i = j + 1;
    }
    (out, tie_term)
}

// ============================================================================
// CORRELATION
// ============================================================================

pub fn pearson(xs: &[f64], ys: &[f64]) -> Result<f64, EngineError> {
    if xs.len() != ys.len() || xs.len() < 3 {
        return Err(EngineError::computation(
            "correlation requires at least 3 paired observations",
        ));
    }
    let mx = mean(xs);
    let my = mean(ys);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return Err(EngineError::computation(
            "correlation undefined for a zero-variance sample",
        ));
    }
    Ok(sxy / (sxx * syy).sqrt())
}

/// Two-sided p-value for a correlation coefficient via the t transform.
pub fn correlation_p(r: f64, n: usize) -> Result<f64, EngineError> {
    let df = n as f64 - 2.0;
    if df <= 0.0 {
        return Err(EngineError::computation("correlation p-value needs n > 2"));
    }
    if (1.0 - r * r) <= f64::EPSILON {
        return Ok(0.0);
    }
    let t = r * (df / (1.0 - r * r)).sqrt();
    t_p_two_sided(t, df)
}

pub fn spearman(xs: &[f64], ys: &[f64]) -> Result<f64, EngineError> {
    let (rx, _) = ranks(xs);
    let (ry, _) = ranks(ys);
    pearson(&rx, &ry)
}

// ============================================================================
// GROUP TESTS
// ============================================================================

/// Brown-Forsythe variant of Levene's test (median-centered deviations).
/// Returns the W statistic and its p-value from F(k-1, N-k).
pub fn levene_brown_forsythe(groups: &[Vec<f64>]) -> Result<(f64, f64), EngineError> {
    let k = groups.len();
    let n_total: usize = groups.iter().map(Vec::len).sum();
    if k < 2 || groups.iter().any(|g| g.len() < 2) {
        return Err(EngineError::computation(
            "variance test requires at least 2 groups with 2 observations each",
        ));
    }
    let z: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let med = median(g);
            g.iter().map(|x| (x - med).abs()).collect()
        })
        .collect();
    let z_all: Vec<f64> = z.iter().flatten().copied().collect();
    let z_grand = mean(&z_all);
    let mut between = 0.0;
    let mut within = 0.0;
    for zi in &z {
        let zbar = mean(zi);
        between += zi.len() as f64 * (zbar - z_grand).powi(2);
        within += zi.iter().map(|v| (v - zbar).powi(2)).sum::<f64>();
    }
    if within <= 0.0 {
        // All deviations identical; variances are trivially homogeneous.
        return Ok((0.0, 1.0));
    }
    let df1 = (k - 1) as f64;
    let df2 = (n_total - k) as f64;
    let w = (df2 / df1) * between / within;
    let p = f_sf(w, df1, df2)?;
    Ok((w, p))
}

/// D'Agostino's K-squared normality omnibus (skewness + kurtosis Z tests).
/// Requires at least 8 observations.
pub fn dagostino_k2(xs: &[f64]) -> Result<(f64, f64), EngineError> {
    let n = xs.len();
    if n < 8 {
        return Err(EngineError::computation(
            "normality omnibus requires at least 8 observations",
        ));
    }
    let nf = n as f64;
    let m = mean(xs);
    let m2 = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / nf;
    if m2 <= 0.0 {
        return Err(EngineError::computation(
            "normality omnibus undefined for a zero-variance sample",
        ));
    }
    let m3 = xs.iter().map(|x| (x - m).powi(3)).sum::<f64>() / nf;
    let m4 = xs.iter().map(|x| (x - m).powi(4)).sum::<f64>() / nf;

    // Skewness Z (D'Agostino 1970).
    let b1 = m3 / m2.powf(1.5);
    let y = b1 * (((nf + 1.0) * (nf + 3.0)) / (6.0 * (nf - 2.0))).sqrt();
    let beta2 = 3.0 * (nf * nf + 27.0 * nf - 70.0) * (nf + 1.0) * (nf + 3.0)
        / ((nf - 2.0) * (nf + 5.0) * (nf + 7.0) * (nf + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let ratio = y / alpha;
    let z_skew = delta * (ratio + (ratio * ratio + 1.0).sqrt()).ln();

    // Kurtosis Z (Anscombe-Glynn 1983).
    let b2 = m4 / (m2 * m2);
    let e_b2 = 3.0 * (nf - 1.0) / (nf + 1.0);
    let var_b2 = 24.0 * nf * (nf - 2.0) * (nf - 3.0)
        / ((nf + 1.0).powi(2) * (nf + 3.0) * (nf + 5.0));
    let x = (b2 - e_b2) / var_b2.sqrt();
    let sqrt_beta1 = 6.0 * (nf * nf - 5.0 * nf + 2.0) / ((nf + 7.0) * (nf + 9.0))
        * (6.0 * (nf + 3.0) * (nf + 5.0) / (nf * (nf - 2.0) * (nf - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / (sqrt_beta1 * sqrt_beta1)).sqrt());
    let term = (1.0 - 2.0 / a) / (1.0 + x * (2.0 / (a - 4.0)).sqrt());
    let z_kurt = ((1.0 - 2.0 / (9.0 * a)) - term.cbrt()) / (2.0 / (9.0 * a)).sqrt();

    let k2 = z_skew * z_skew + z_kurt * z_kurt;
    let p = chi2_sf(k2, 2.0)?;
    Ok((k2, p))
}

/// Mann-Whitney U with normal approximation and tie correction.
/// Returns (U of the first sample, z, two-sided p).
pub fn mann_whitney(a: &[f64], b: &[f64]) -> Result<(f64, f64, f64), EngineError> {
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    if a.is_empty() || b.is_empty() {
        return Err(EngineError::computation("both samples must be non-empty"));
    }
    let combined: Vec<f64> = a.iter().chain(b).copied().collect();
    let (r, tie_term) = ranks(&combined);
    let r1: f64 = r[..a.len()].iter().sum();
    let u1 = r1 - n1 * (n1 + 1.0) / 2.0;
    let n = n1 + n2;
    let mu = n1 * n2 / 2.0;
    let tie_adj = tie_term / (n * (n - 1.0));
    let sigma2 = n1 * n2 / 12.0 * ((n + 1.0) - tie_adj);
    if sigma2 <= 0.0 {
        return Err(EngineError::computation(
            "rank test undefined when all observations are tied",
        ));
    }
    // Continuity-corrected z.
    let diff = u1 - mu;
    let z = if diff == 0.0 {
        0.0
    } else {
        (diff - 0.5 * diff.signum()) / sigma2.sqrt()
    };
    let p = (2.0 * normal_sf(z.abs())).clamp(0.0, 1.0);
    Ok((u1, z, p))
}

/// Kruskal-Wallis H with tie correction. Returns (H, df, p).
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> Result<(f64, f64, f64), EngineError> {
    let k = groups.len();
    if k < 2 || groups.iter().any(Vec::is_empty) {
        return Err(EngineError::computation(
            "rank test requires at least 2 non-empty groups",
        ));
    }
    let combined: Vec<f64> = groups.iter().flatten().copied().collect();
    let n = combined.len() as f64;
    let (r, tie_term) = ranks(&combined);
    let mut h = 0.0;
    let mut offset = 0;
    for g in groups {
        let r_sum: f64 = r[offset..offset + g.len()].iter().sum();
        h += r_sum * r_sum / g.len() as f64;
        offset += g.len();
    }
    h = 12.0 / (n * (n + 1.0)) * h - 3.0 * (n + 1.0);
    let correction = 1.0 - tie_term / (n * n * n - n);
    if correction <= 0.0 {
        return Err(EngineError::computation(
            "rank test undefined when all observations are tied",
        ));
    }
    h /= correction;
    let df = (k - 1) as f64;
    let p = chi2_sf(h, df)?;
    Ok((h, df, p))
}

/// Pearson chi-squared on a contingency table.
/// Returns (chi2, df, p, expected counts).
pub fn chi2_contingency(
    observed: &[Vec<f64>],
) -> Result<(f64, f64, f64, Vec<Vec<f64>>), EngineError> {
    let rows = observed.len();
    let cols = observed.first().map(Vec::len).unwrap_or(0);
    if rows < 2 || cols < 2 {
        return Err(EngineError::computation(
            "contingency table needs at least 2 rows and 2 columns",
        ));
    }
    let row_sums: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
    let col_sums: Vec<f64> = (0..cols)
        .map(|j| observed.iter().map(|r| r[j]).sum())
        .collect();
    let total: f64 = row_sums.iter().sum();
    if total <= 0.0 {
        return Err(EngineError::computation("contingency table is empty"));
    }
    let mut chi2 = 0.0;
    let mut expected = vec![vec![0.0; cols]; rows];
    for i in 0..rows {
        for j in 0..cols {
            let e = row_sums[i] * col_sums[j] / total;
            expected[i][j] = e;
            if e > 0.0 {
                chi2 += (observed[i][j] - e).powi(2) / e;
            }
        }
    }
    let df = ((rows - 1) * (cols - 1)) as f64;
    let p = chi2_sf(chi2, df)?;
    Ok((chi2, df, p, expected))
}

/// Cohen's d with pooled standard deviation.
pub fn cohens_d(a: &[f64], b: &[f64]) -> Option<f64> {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    if n1 < 2.0 || n2 < 2.0 {
        return None;
    }
    let pooled =
        (((n1 - 1.0) * variance(a) + (n2 - 1.0) * variance(b)) / (n1 + n2 - 2.0)).sqrt();
    if pooled <= 0.0 {
        return None;
    }
    Some((mean(a) - mean(b)) / pooled)
}

/// Conventional magnitude label for a standardized effect size.
pub fn effect_label(d: f64) -> &'static str {
    let d = d.abs();
    if d < 0.2 {
        "negligible"
    } else if d < 0.5 {
        "small"
    } else if d < 0.8 {
        "medium"
    } else {
        "large"
    }
}

// ============================================================================
// LEAST SQUARES
// ============================================================================

/// A fitted ordinary-least-squares model. Coefficient 0 is the intercept.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub p_values: Vec<f64>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub df_residual: f64,
}

/// Fits y on the predictor rows (intercept added internally).
pub fn ols(y: &[f64], predictors: &[Vec<f64>]) -> Result<OlsFit, EngineError> {
    let n = y.len();
    let p = predictors.first().map(Vec::len).unwrap_or(0);
    if n != predictors.len() {
        return Err(EngineError::computation(
            "response and predictor rows must align",
        ));
    }
    let k = p + 1; // with intercept
    if n <= k {
        return Err(EngineError::computation(format!(
            "least squares needs more observations ({n}) than parameters ({k})"
        )));
    }

    // Design matrix rows with a leading 1.
    let design: Vec<Vec<f64>> = predictors
        .iter()
        .map(|row| {
            let mut d = Vec::with_capacity(k);
            d.push(1.0);
            d.extend_from_slice(row);
            d
        })
        .collect();

    // Normal equations: (X'X) b = X'y.
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in design.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * yi;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let xtx_inv = invert(&xtx).ok_or_else(|| {
        EngineError::computation("design matrix is singular (collinear or constant predictors)")
    })?;
    let coefficients: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| xtx_inv[i][j] * xty[j]).sum())
        .collect();

    let fitted: Vec<f64> = design
        .iter()
        .map(|row| row.iter().zip(&coefficients).map(|(x, b)| x * b).sum())
        .collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(yi, fi)| yi - fi).collect();

    let y_mean = mean(y);
    let ss_total: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    let ss_resid: f64 = residuals.iter().map(|r| r * r).sum();
    let r_squared = if ss_total > 0.0 {
        1.0 - ss_resid / ss_total
    } else {
        0.0
    };
    let df_residual = (n - k) as f64;
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n as f64 - 1.0) / df_residual;
    let sigma2 = ss_resid / df_residual;

    let mut std_errors = Vec::with_capacity(k);
    let mut t_values = Vec::with_capacity(k);
    let mut p_values = Vec::with_capacity(k);
    for i in 0..k {
        let se = (sigma2 * xtx_inv[i][i]).sqrt();
        let t = if se > 0.0 { coefficients[i] / se } else { 0.0 };
        std_errors.push(se);
        t_values.push(t);
        p_values.push(t_p_two_sided(t, df_residual)?);
    }

    let df_model = p as f64;
    let (f_statistic, f_p_value) = if df_model > 0.0 && ss_resid > 0.0 {
        let f = ((ss_total - ss_resid) / df_model) / (ss_resid / df_residual);
        (f, f_sf(f, df_model, df_residual)?)
    } else {
        (0.0, 1.0)
    };

    Ok(OlsFit {
        coefficients,
        std_errors,
        t_values,
        p_values,
        fitted,
        residuals,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_p_value,
        df_residual,
    })
}

/// Durbin-Watson statistic over ordered residuals.
pub fn durbin_watson(residuals: &[f64]) -> f64 {
    let denom: f64 = residuals.iter().map(|r| r * r).sum();
    if denom <= 0.0 {
        return 2.0;
    }
    let num: f64 = residuals
        .windows(2)
        .map(|w| (w[1] - w[0]).powi(2))
        .sum();
    num / denom
}

/// Variance inflation factors, one per predictor column.
pub fn variance_inflation(matrix: &[Vec<f64>]) -> Result<Vec<f64>, EngineError> {
    let p = matrix.first().map(Vec::len).unwrap_or(0);
    if p < 2 {
        return Ok(vec![1.0; p]);
    }
    let mut vifs = Vec::with_capacity(p);
    for target in 0..p {
        let y: Vec<f64> = matrix.iter().map(|row| row[target]).collect();
        let others: Vec<Vec<f64>> = matrix
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(j, _)| *j != target)
                    .map(|(_, v)| *v)
                    .collect()
            })
            .collect();
        let fit = ols(&y, &others)?;
        let r2 = fit.r_squared.min(1.0 - 1e-12);
        vifs.push(1.0 / (1.0 - r2));
    }
    Ok(vifs)
}

/// Gauss-Jordan inversion with partial pivoting. None when singular.
fn invert(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&a, &b| aug[a][col].abs().total_cmp(&aug[b][col].abs()))?;
        if aug[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        aug.swap(col, pivot_row);
        let pivot = aug[col][col];
        for v in &mut aug[col] {
            *v /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[row][col];
                if factor != 0.0 {
                    for j in 0..2 * n {
                        aug[row][j] -= factor * aug[col][j];
                    }
                }
            }
        }
    }
    Some(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

// ============================================================================
// PROCESS CONTROL CONSTANTS
// ============================================================================

/// Control chart constants (A2, D3, D4, d2) for subgroup sizes 2..=10.
pub fn xbar_r_constants(subgroup_size: usize) -> Option<(f64, f64, f64, f64)> {
    match subgroup_size {
        2 => Some((1.880, 0.0, 3.267, 1.128)),
        3 => Some((1.023, 0.0, 2.574, 1.693)),
        4 => Some((0.729, 0.0, 2.282, 2.059)),
        5 => Some((0.577, 0.0, 2.114, 2.326)),
        6 => Some((0.483, 0.0, 2.004, 2.534)),
        7 => Some((0.419, 0.076, 1.924, 2.704)),
        8 => Some((0.373, 0.136, 1.864, 2.847)),
        9 => Some((0.337, 0.184, 1.816, 2.970)),
        10 => Some((0.308, 0.223, 1.777, 3.078)),
        _ => None,
    }
}

/// d2 for moving ranges of span 2, d4 upper constant for the MR chart.
pub const MR_D2: f64 = 1.128;
pub const MR_D4: f64 = 3.267;

/// Consecutive absolute differences.
pub fn moving_ranges(xs: &[f64]) -> Vec<f64> {
    xs.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn moments_on_known_sample() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&xs) - 5.0).abs() < EPS);
        assert!((variance(&xs) - 32.0 / 7.0).abs() < EPS);
        assert!((median(&xs) - 4.5).abs() < EPS);
    }

    #[test]
    fn percentile_interpolates() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&xs, 25.0) - 1.75).abs() < EPS);
        assert!((percentile(&xs, 100.0) - 4.0).abs() < EPS);
    }

    #[test]
    fn ranks_average_ties() {
        let (r, tie) = ranks(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(r, vec![1.0, 2.5, 2.5, 4.0]);
        assert!((tie - 6.0).abs() < EPS);
    }

    #[test]
    fn normal_tail_symmetry() {
        assert!((normal_cdf(0.0) - 0.5).abs() < EPS);
        assert!((normal_sf(1.959964) - 0.025).abs() < 1e-4);
    }

    #[test]
    fn t_tail_matches_tables() {
        // t = 2.228, df = 10 is the classic 5% two-sided critical value.
        let p = t_p_two_sided(2.228, 10.0).unwrap();
        assert!((p - 0.05).abs() < 1e-3);
    }

    #[test]
    fn chi2_tail_matches_tables() {
        // chi2 = 3.841, df = 1 -> p ~ 0.05.
        let p = chi2_sf(3.841, 1.0).unwrap();
        assert!((p - 0.05).abs() < 1e-3);
    }

    #[test]
    fn pearson_perfect_line() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&xs, &ys).unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn levene_flags_unequal_spread() {
        let tight: Vec<f64> = (0..20).map(|i| 10.0 + 0.01 * i as f64).collect();
        let wide: Vec<f64> = (0..20).map(|i| 10.0 + 2.0 * (i as f64 - 10.0)).collect();
        let (_, p) = levene_brown_forsythe(&[tight, wide]).unwrap();
        assert!(p < 0.01);
    }

    #[test]
    fn dagostino_accepts_symmetric_data() {
        let xs: Vec<f64> = (0..40).map(|i| (i as f64 - 19.5) / 10.0).collect();
        let (_, p) = dagostino_k2(&xs).unwrap();
        assert!(p > 0.0 && p <= 1.0);
    }

    #[test]
    fn dagostino_rejects_tiny_samples() {
        assert!(dagostino_k2(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn mann_whitney_separated_samples() {
        let a: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let (u, _, p) = mann_whitney(&a, &b).unwrap();
        assert!((u - 0.0).abs() < EPS);
        assert!(p < 0.001);
    }

    #[test]
    fn ols_recovers_exact_line_with_noise() {
        // y = 3 + 2x plus a small alternating perturbation.
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20)
            .map(|i| 3.0 + 2.0 * i as f64 + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        let fit = ols(&y, &x).unwrap();
        assert!((fit.coefficients[0] - 3.0).abs() < 0.1);
        assert!((fit.coefficients[1] - 2.0).abs() < 0.01);
        assert!(fit.r_squared > 0.99);
        assert!(fit.p_values[1] < 1e-6);
    }

    #[test]
    fn ols_rejects_constant_predictor() {
        let x: Vec<Vec<f64>> = (0..10).map(|_| vec![5.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(ols(&y, &x).is_err());
    }

    #[test]
    fn vif_detects_duplicated_predictor() {
        let matrix: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let v = i as f64 + if i % 3 == 0 { 0.01 } else { 0.0 };
                vec![i as f64, v]
            })
            .collect();
        let vifs = variance_inflation(&matrix).unwrap();
        assert!(vifs.iter().all(|&v| v > 10.0));
    }

    #[test]
    fn chi2_contingency_independence() {
        let observed = vec![vec![25.0, 25.0], vec![25.0, 25.0]];
        let (chi2, df, p, expected) = chi2_contingency(&observed).unwrap();
        assert!(chi2.abs() < EPS);
        assert!((df - 1.0).abs() < EPS);
        assert!((p - 1.0).abs() < 1e-9);
        assert!((expected[0][0] - 25.0).abs() < EPS);
    }

    #[test]
    fn effect_labels_follow_conventions() {
        assert_eq!(effect_label(0.1), "negligible");
        assert_eq!(effect_label(-0.3), "small");
        assert_eq!(effect_label(0.6), "medium");
        assert_eq!(effect_label(1.2), "large");
    }

    #[test]
    fn moving_ranges_are_absolute_steps() {
        assert_eq!(moving_ranges(&[1.0, 4.0, 2.0]), vec![3.0, 2.0]);
    }
}
