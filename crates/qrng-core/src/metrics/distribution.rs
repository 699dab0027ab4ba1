//! Summary statistics over a sample.
//!
//! Standard deviation is the population form (divide by `n`). Percentiles use
//! linear interpolation between closest ranks: for `p` in `[0, 100]`,
//! `rank = p/100 · (n-1)` and the result interpolates between the values at
//! `floor(rank)` and `ceil(rank)` of the sorted sample. The median is the 50th
//! percentile under the same rule.

use serde::Serialize;

/// Percentile cut points reported for every distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Distribution summary of a non-empty sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistributionStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
}

impl DistributionStats {
    /// Summarize `values`. Returns `None` for an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let m = mean(values);
        Some(Self {
            count: values.len(),
            mean: m,
            median: percentile_sorted(&sorted, 50.0),
            std: population_std(values, m),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            percentiles: Percentiles {
                p25: percentile_sorted(&sorted, 25.0),
                p50: percentile_sorted(&sorted, 50.0),
                p75: percentile_sorted(&sorted, 75.0),
                p90: percentile_sorted(&sorted, 90.0),
                p95: percentile_sorted(&sorted, 95.0),
                p99: percentile_sorted(&sorted, 99.0),
            },
        })
    }
}

/// Arithmetic mean; 0.0 for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Linear-interpolation percentile of an ascending, non-empty sample.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        }
    }
}
