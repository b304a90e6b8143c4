//! Monte Carlo bootstrap over realized per-trade returns.
//!
//! Each trial resamples the trade returns with replacement, compounds them
//! from a normalized base of 1.0, and records the final return and whether
//! the path's drawdown ever exceeded the ruin threshold.
//!
//! Trials run in parallel on the rayon pool. Each trial owns a `StdRng`
//! seeded from `(seed, trial index)`, so results do not depend on thread
//! count or scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::cancel::CancelToken;
use super::error::BacktestError;

pub const DEFAULT_RUNS: usize = 500;
pub const MAX_RUNS: usize = 100_000;
pub const DEFAULT_RUIN_THRESHOLD_PCT: f64 = 50.0;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_BUCKETS: usize = 20;
const MAX_BUCKETS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonteCarloConfig {
    pub runs: usize,
    pub ruin_threshold_pct: f64,
    pub seed: u64,
    pub buckets: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            runs: DEFAULT_RUNS,
            ruin_threshold_pct: DEFAULT_RUIN_THRESHOLD_PCT,
            seed: DEFAULT_SEED,
            buckets: DEFAULT_BUCKETS,
        }
    }
}

impl MonteCarloConfig {
    pub fn sanitized(&self) -> Self {
        let runs = self.runs.clamp(1, MAX_RUNS);
        if runs != self.runs {
            tracing::warn!(value = self.runs, clamped = runs, "monte carlo runs out of range");
        }
        let ruin_threshold_pct =
            if self.ruin_threshold_pct.is_finite() && self.ruin_threshold_pct > 0.0 {
                self.ruin_threshold_pct.min(100.0)
            } else {
                tracing::warn!(
                    value = self.ruin_threshold_pct,
                    "invalid ruin threshold, using default"
                );
                DEFAULT_RUIN_THRESHOLD_PCT
            };
        Self {
            runs,
            ruin_threshold_pct,
            seed: self.seed,
            buckets: self.buckets.clamp(1, MAX_BUCKETS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBucket {
    pub from: f64,
    pub to: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloResult {
    pub runs: usize,
    /// Final-return percentiles, in percent.
    pub median: f64,
    pub p5: f64,
    pub p95: f64,
    pub profit_probability_pct: f64,
    pub ruin_probability_pct: f64,
    pub histogram: Vec<HistogramBucket>,
}

impl MonteCarloResult {
    /// Result for an empty trade list: no trials, everything zero.
    pub fn degenerate() -> Self {
        Self {
            runs: 0,
            median: 0.0,
            p5: 0.0,
            p95: 0.0,
            profit_probability_pct: 0.0,
            ruin_probability_pct: 0.0,
            histogram: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrialOutcome {
    final_return_pct: f64,
    ruined: bool,
}

pub fn simulate(trade_returns_pct: &[f64], config: &MonteCarloConfig) -> MonteCarloResult {
    run(trade_returns_pct, config, &|| false).unwrap_or_else(MonteCarloResult::degenerate)
}

/// Like [`simulate`], but stops scheduling trials once `cancel` fires and
/// discards whatever finished.
pub fn simulate_cancellable(
    trade_returns_pct: &[f64],
    config: &MonteCarloConfig,
    cancel: &CancelToken,
) -> Result<MonteCarloResult, BacktestError> {
    let is_cancelled = || cancel.is_cancelled();
    match run(trade_returns_pct, config, &is_cancelled) {
        Some(result) if !cancel.is_cancelled() => Ok(result),
        _ => {
            tracing::info!("monte carlo cancelled");
            Err(BacktestError::Cancelled)
        }
    }
}

/// `None` only when cancelled.
fn run(
    trade_returns_pct: &[f64],
    config: &MonteCarloConfig,
    is_cancelled: &(dyn Fn() -> bool + Sync),
) -> Option<MonteCarloResult> {
    let config = config.sanitized();
    let returns: Vec<f64> = trade_returns_pct
        .iter()
        .copied()
        .filter(|r| r.is_finite())
        .collect();
    if returns.is_empty() {
        return Some(MonteCarloResult::degenerate());
    }

    let outcomes: Vec<TrialOutcome> = (0..config.runs)
        .into_par_iter()
        .map(|trial| {
            if is_cancelled() {
                return None;
            }
            let mut rng = StdRng::seed_from_u64(trial_seed(config.seed, trial as u64));
            Some(run_trial(&returns, config.ruin_threshold_pct, &mut rng))
        })
        .collect::<Option<Vec<_>>>()?;

    tracing::debug!(runs = outcomes.len(), trades = returns.len(), "monte carlo finished");
    Some(summarize(&outcomes, config.buckets))
}

/// SplitMix64 over the master seed and trial index.
fn trial_seed(seed: u64, trial: u64) -> u64 {
    let mut z = seed
        .wrapping_add(trial.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn run_trial(returns: &[f64], ruin_threshold_pct: f64, rng: &mut StdRng) -> TrialOutcome {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut ruined = false;

    for _ in 0..returns.len() {
        let r = returns[rng.gen_range(0..returns.len())];
        equity = (equity * (1.0 + r / 100.0)).max(0.0);
        peak = peak.max(equity);
        if peak > 0.0 && (peak - equity) / peak * 100.0 > ruin_threshold_pct {
            ruined = true;
        }
    }

    TrialOutcome {
        final_return_pct: (equity - 1.0) * 100.0,
        ruined,
    }
}

fn summarize(outcomes: &[TrialOutcome], buckets: usize) -> MonteCarloResult {
    let runs = outcomes.len();
    if runs == 0 {
        return MonteCarloResult::degenerate();
    }

    let mut finals: Vec<f64> = outcomes.iter().map(|o| o.final_return_pct).collect();
    finals.sort_by(|a, b| a.total_cmp(b));

    let profitable = finals.iter().filter(|r| **r > 0.0).count();
    let ruined = outcomes.iter().filter(|o| o.ruined).count();

    MonteCarloResult {
        runs,
        median: percentile_sorted(&finals, 50.0),
        p5: percentile_sorted(&finals, 5.0),
        p95: percentile_sorted(&finals, 95.0),
        profit_probability_pct: 100.0 * profitable as f64 / runs as f64,
        ruin_probability_pct: 100.0 * ruined as f64 / runs as f64,
        histogram: histogram(&finals, buckets),
    }
}

/// Linear interpolation between closest ranks.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    (sorted[lo] + (sorted[hi] - sorted[lo]) * frac).clamp(sorted[lo], sorted[hi])
}

/// Equal-width buckets spanning [min, max] of the sorted values.
fn histogram(sorted: &[f64], buckets: usize) -> Vec<HistogramBucket> {
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let width = (max - min) / buckets as f64;
    if !(width > 0.0) {
        return vec![HistogramBucket {
            from: min,
            to: max,
            count: sorted.len(),
        }];
    }

    let mut out: Vec<HistogramBucket> = (0..buckets)
        .map(|b| HistogramBucket {
            from: min + width * b as f64,
            to: if b + 1 == buckets {
                max
            } else {
                min + width * (b + 1) as f64
            },
            count: 0,
        })
        .collect();
    for v in sorted {
        let idx = (((v - min) / width) as usize).min(buckets - 1);
        out[idx].count += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config(runs: usize) -> MonteCarloConfig {
        MonteCarloConfig {
            runs,
            ..MonteCarloConfig::default()
        }
    }

    #[test]
    fn empty_returns_degenerate() {
        let result = simulate(&[], &config(500));
        assert_eq!(result, MonteCarloResult::degenerate());
    }

    #[test]
    fn non_finite_returns_dropped() {
        let result = simulate(&[f64::NAN, f64::INFINITY], &config(10));
        assert_eq!(result.runs, 0);
    }

    #[test]
    fn same_seed_same_result() {
        let returns = [2.0, -1.5, 3.2, -0.7, 1.1, -2.4, 0.9];
        let a = simulate(&returns, &config(300));
        let b = simulate(&returns, &config(300));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_differs() {
        let returns = [2.0, -1.5, 3.2, -0.7, 1.1, -2.4, 0.9];
        let a = simulate(&returns, &config(300));
        let b = simulate(
            &returns,
            &MonteCarloConfig {
                seed: 7,
                ..config(300)
            },
        );
        assert_ne!(a, b);
    }

    #[test]
    fn percentiles_ordered_and_probabilities_bounded() {
        let returns = [5.0, -3.0, 1.0, -1.0, 2.5, -4.0, 0.5, 3.0];
        let r = simulate(&returns, &config(1000));
        assert_eq!(r.runs, 1000);
        assert!(r.p5 <= r.median && r.median <= r.p95);
        assert!((0.0..=100.0).contains(&r.profit_probability_pct));
        assert!((0.0..=100.0).contains(&r.ruin_probability_pct));
        assert_eq!(r.histogram.len(), DEFAULT_BUCKETS);
        assert_eq!(r.histogram.iter().map(|b| b.count).sum::<usize>(), 1000);
    }

    #[test]
    fn all_winners_never_ruin() {
        let r = simulate(&[1.0, 2.0, 3.0], &config(200));
        assert_relative_eq!(r.profit_probability_pct, 100.0);
        assert_relative_eq!(r.ruin_probability_pct, 0.0);
        assert!(r.p5 > 0.0);
    }

    #[test]
    fn single_constant_return_collapses() {
        let r = simulate(&[10.0], &config(50));
        assert_relative_eq!(r.median, 10.0, epsilon = 1e-9);
        assert_relative_eq!(r.p5, 10.0, epsilon = 1e-9);
        assert_eq!(r.histogram.len(), 1);
        assert_eq!(r.histogram[0].count, 50);
    }

    #[test]
    fn catastrophic_losses_ruin() {
        let r = simulate(&[-60.0, -70.0], &config(100));
        assert_relative_eq!(r.ruin_probability_pct, 100.0);
        assert_relative_eq!(r.profit_probability_pct, 0.0);
    }

    #[test]
    fn runs_clamped() {
        let c = MonteCarloConfig {
            runs: 0,
            ruin_threshold_pct: -1.0,
            seed: 1,
            buckets: 0,
        }
        .sanitized();
        assert_eq!(c.runs, 1);
        assert_eq!(c.ruin_threshold_pct, DEFAULT_RUIN_THRESHOLD_PCT);
        assert_eq!(c.buckets, 1);
        assert_eq!(config(MAX_RUNS + 5).sanitized().runs, MAX_RUNS);
    }

    #[test]
    fn cancelled_before_start_returns_error() {
        let token = CancelToken::new();
        token.cancel();
        let err = simulate_cancellable(&[1.0, -1.0], &config(1000), &token).unwrap_err();
        assert!(matches!(err, BacktestError::Cancelled));
    }

    #[test]
    fn cancellable_matches_plain_when_not_cancelled() {
        let returns = [1.5, -0.5, 2.0];
        let token = CancelToken::new();
        let a = simulate_cancellable(&returns, &config(100), &token).unwrap();
        assert_eq!(a, simulate(&returns, &config(100)));
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_relative_eq!(percentile_sorted(&sorted, 50.0), 20.0);
        assert_relative_eq!(percentile_sorted(&sorted, 5.0), 2.0);
        assert_relative_eq!(percentile_sorted(&sorted, 100.0), 40.0);
    }
}
