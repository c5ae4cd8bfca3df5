//! Summary statistics over posterior draws and per-unit series.
//!
//! Callers must filter out absent values before calling these functions.
//! Empty input yields `None` (or NaN for the raw kernels where noted).

use serde::{Deserialize, Serialize};

/// Arithmetic mean. `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased sample variance (n - 1 denominator). `None` for fewer than two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (values.len() - 1) as f64)
}

/// Quantile with linear interpolation between order statistics
/// (Hyndman & Fan type 7).
///
/// `p` is clamped to [0, 1]. Returns NaN for empty input or NaN values.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) || p.is_nan() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, p)
}

/// Type-7 quantile of already sorted values.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let p = p.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Lag-k autocorrelation of a chain.
///
/// Returns 0 for a constant chain or when `lag >= n`.
pub fn autocorrelation(chain: &[f64], lag: usize) -> f64 {
    let n = chain.len();
    if lag >= n {
        return 0.0;
    }
    let m = match mean(chain) {
        Some(m) => m,
        None => return 0.0,
    };
    let denom: f64 = chain.iter().map(|v| (v - m) * (v - m)).sum();
    if denom <= 0.0 {
        return 0.0;
    }
    let num: f64 = chain[..n - lag]
        .iter()
        .zip(&chain[lag..])
        .map(|(a, b)| (a - m) * (b - m))
        .sum();
    num / denom
}

/// Effective sample size of a single MCMC chain.
///
/// Uses Geyer's initial positive sequence: autocorrelations are summed in
/// adjacent pairs until a pair sum turns non-positive. A constant chain
/// reports its full length. The result is clamped to `[1, n]`.
pub fn effective_sample_size(chain: &[f64]) -> f64 {
    let n = chain.len();
    if n == 0 {
        return 0.0;
    }
    if n < 4 {
        return n as f64;
    }
    let constant = chain.iter().all(|v| *v == chain[0]);
    if constant {
        return n as f64;
    }

    let mut tau = -1.0;
    let mut k = 0;
    while k + 1 < n {
        let pair = autocorrelation(chain, k) + autocorrelation(chain, k + 1);
        if pair <= 0.0 {
            break;
        }
        tau += 2.0 * pair;
        k += 2;
    }
    if tau <= 0.0 {
        return n as f64;
    }
    (n as f64 / tau).clamp(1.0, n as f64)
}

/// Posterior summary for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub name: String,
    pub mean: f64,
    pub median: f64,
    /// 2.5% posterior quantile.
    pub lower: f64,
    /// 97.5% posterior quantile.
    pub upper: f64,
    pub n_sample: usize,
    pub n_effective: f64,
}

impl ParameterSummary {
    /// Summarise one parameter's draws. `None` for an empty chain.
    pub fn from_draws(name: impl Into<String>, draws: &[f64]) -> Option<Self> {
        let mean = mean(draws)?;
        let mut sorted = draws.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(ParameterSummary {
            name: name.into(),
            mean,
            median: quantile_sorted(&sorted, 0.5),
            lower: quantile_sorted(&sorted, 0.025),
            upper: quantile_sorted(&sorted, 0.975),
            n_sample: draws.len(),
            n_effective: effective_sample_size(draws),
        })
    }

    /// Whether the 95% credible interval excludes zero.
    pub fn excludes_zero(&self) -> bool {
        self.lower > 0.0 || self.upper < 0.0
    }
}
