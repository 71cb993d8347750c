//! Cross-trial aggregation: mean, sample standard deviation, and bootstrap
//! confidence intervals over a workload's per-trial throughput and IOPS.
//!
//! Kept as a small stateless set of statistical helpers rather than a
//! struct that owns running state: every function takes the values it
//! needs and returns a result, which keeps trial-level statistics testable
//! in isolation from how a workload's trials were produced.

use crate::histogram::LatencySummary;
use crate::plan::ConfidenceInterval;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Fixed seed for bootstrap resampling so repeated runs over the same
/// inputs produce byte-identical confidence intervals.
const BOOTSTRAP_SEED: u64 = 42;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator). `0.0` for fewer than two
/// samples.
pub fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Bootstrap a 95% confidence interval for the mean of `values`.
///
/// Degenerate cases: an empty input returns `(0.0, 0.0)`; a single sample
/// returns `(values[0], values[0])`. Otherwise resamples `values` with
/// replacement `iterations` times, computes the mean of each resample, and
/// returns the 2.5th/97.5th percentile of the resulting distribution of
/// means. Always seeded with [`BOOTSTRAP_SEED`] so a given input and
/// iteration count reproduce an identical interval on every run.
pub fn bootstrap_confidence_interval(values: &[f64], iterations: u32) -> ConfidenceInterval {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    if n < 2 {
        return (values[0], values[0]);
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(BOOTSTRAP_SEED);
    let mut means = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
        let mut sum = 0.0;
        for _ in 0..n {
            let idx = rng.gen_range(0..n);
            sum += values[idx];
        }
        means.push(sum / n as f64);
    }
    means.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let lower_idx = ((iterations as f64) * 0.025).floor() as usize;
    let upper_idx = ((iterations as f64) * 0.975).floor() as usize;
    let upper_idx = upper_idx.min(means.len() - 1);
    (means[lower_idx], means[upper_idx])
}

/// Aggregate every trial's latency summary into one workload-level summary:
/// the arithmetic mean of each percentile/min/mean across trials, and the
/// maximum of each trial's max.
pub fn aggregate_latency(summaries: &[LatencySummary]) -> LatencySummary {
    if summaries.is_empty() {
        return LatencySummary {
            min_us: 0.0,
            p50_us: 0.0,
            p90_us: 0.0,
            p95_us: 0.0,
            p99_us: 0.0,
            p999_us: 0.0,
            max_us: 0.0,
            mean_us: 0.0,
        };
    }
    let n = summaries.len() as f64;
    let sum = |f: fn(&LatencySummary) -> f64| summaries.iter().map(f).sum::<f64>() / n;
    let max = |f: fn(&LatencySummary) -> f64| {
        summaries
            .iter()
            .map(f)
            .fold(f64::MIN, |acc, v| acc.max(v))
    };

    LatencySummary {
        min_us: sum(|s| s.min_us),
        p50_us: sum(|s| s.p50_us),
        p90_us: sum(|s| s.p90_us),
        p95_us: sum(|s| s.p95_us),
        p99_us: sum(|s| s.p99_us),
        p999_us: sum(|s| s.p999_us),
        max_us: max(|s| s.max_us),
        mean_us: sum(|s| s.mean_us),
    }
}
