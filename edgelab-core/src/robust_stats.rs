//! Robust statistics — bias-corrected edge estimates from small trade samples.
//!
//! A pattern that fired eight times and won seven of them does not have an
//! 87.5% win rate. This module pulls raw rates toward a neutral prior,
//! penalizes small samples, blends the worst observed loss into the expected
//! value, and folds the result into a 0–100 confidence score.
//!
//! All functions tolerate empty and single-element samples and never divide
//! by zero; degenerate input yields neutral values.

use serde::{Deserialize, Serialize};

use crate::metrics::{mean, std_dev, STD_EPSILON};
use crate::significance::{one_tailed_t_test, Significance, DEFAULT_ALPHA};

// ─── Configuration ───────────────────────────────────────────────────

/// Thresholds and weights for robust statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustStatsConfig {
    /// Below this many observations the sample-size factor is flat at 0.2.
    pub critical_sample: usize,
    /// Sample-size factor reaches 0.6 here.
    pub moderate_sample: usize,
    /// Sample-size factor reaches 1.0 here.
    pub good_sample: usize,
    /// Significance level for the one-tailed t-test.
    pub alpha: f64,
    /// Weight of the worst observed loss in the pessimistic EV blend.
    pub max_loss_weight: f64,
}

impl Default for RobustStatsConfig {
    fn default() -> Self {
        Self {
            critical_sample: 5,
            moderate_sample: 15,
            good_sample: 30,
            alpha: DEFAULT_ALPHA,
            max_loss_weight: 0.5,
        }
    }
}

/// Component weights for [`robust_score`]. Defaults sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub confidence: f64,
    pub pessimistic_ev: f64,
    pub consistency: f64,
    pub significance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            confidence: 0.4,
            pessimistic_ev: 0.3,
            consistency: 0.2,
            significance: 0.1,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Mean, sample standard deviation and their ratio for a return sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consistency {
    pub mean: f64,
    pub std: f64,
    /// mean / std over raw, non-annualized returns. 0 when undefined.
    pub ratio: f64,
}

/// Bias-corrected statistics for one (pattern, instrument) return sample.
///
/// Immutable once computed; recompute wholesale when the sample changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustStatistics {
    pub sample_size: usize,
    pub raw_win_rate: f64,
    pub raw_mean_return: f64,
    /// Laplace-smoothed win rate, strictly inside (0, 1).
    pub adjusted_win_rate: f64,
    /// Mean of the positive returns (0 when there are none).
    pub avg_win: f64,
    /// Mean of the negative returns, as a negative number (0 when there are none).
    pub avg_loss: f64,
    pub std_dev: f64,
    pub consistency: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub is_significant: bool,
    /// Confidence in [0.2, 1.0] from the sample size alone.
    pub sample_size_factor: f64,
    /// Most negative return observed, or 0 when nothing lost.
    pub worst_loss: f64,
    pub pessimistic_ev: f64,
    /// Overall confidence in [0, 100].
    pub confidence_score: f64,
}

// ─── Building blocks ─────────────────────────────────────────────────

/// Laplace-smoothed win rate: (wins + 1) / (total + 2).
///
/// Exactly 0.5 with no observations; tends to the raw rate as `total` grows.
pub fn bayesian_win_rate(wins: usize, total: usize) -> f64 {
    smoothed_win_rate(wins, total, 0.5)
}

/// Win rate smoothed toward `prior` with the weight of two pseudo-observations.
///
/// `prior` is clamped into [0.01, 0.99] so the result stays strictly inside (0, 1).
/// A prior of 0.5 is Laplace's rule of succession.
pub fn smoothed_win_rate(wins: usize, total: usize, prior: f64) -> f64 {
    let prior = if prior.is_finite() {
        prior.clamp(0.01, 0.99)
    } else {
        0.5
    };
    let wins = wins.min(total) as f64;
    (wins + 2.0 * prior) / (total as f64 + 2.0)
}

/// Piecewise-linear confidence in a sample of size `n`, in [0.2, 1.0].
///
/// Flat 0.2 below `critical_sample`, ramps to 0.6 at `moderate_sample`,
/// ramps to 1.0 at `good_sample`, flat afterwards.
pub fn sample_size_factor(n: usize, config: &RobustStatsConfig) -> f64 {
    let critical = config.critical_sample as f64;
    let moderate = (config.moderate_sample as f64).max(critical);
    let good = (config.good_sample as f64).max(moderate);
    let n = n as f64;

    if n < critical {
        0.2
    } else if n < moderate {
        0.2 + 0.4 * (n - critical) / (moderate - critical)
    } else if n < good {
        0.6 + 0.4 * (n - moderate) / (good - moderate)
    } else {
        1.0
    }
}

/// Sharpe-like consistency over raw returns: mean / sample std.
pub fn return_consistency(returns: &[f64]) -> Consistency {
    let m = mean(returns);
    let std = std_dev(returns);
    let ratio = if returns.len() < 2 || std < STD_EPSILON {
        0.0
    } else {
        m / std
    };
    Consistency {
        mean: m,
        std,
        ratio,
    }
}

/// One-tailed significance of a positive mean return.
pub fn statistical_significance(returns: &[f64], alpha: f64) -> Significance {
    one_tailed_t_test(returns, alpha)
}

/// Expected value with a loss severity blended toward the worst loss.
///
/// `avg_loss` and `max_loss` are negative returns; the blended loss is
/// `avg_loss·(1−α) + max_loss·α`.
pub fn pessimistic_ev(
    adjusted_win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    max_loss: f64,
    max_loss_weight: f64,
) -> f64 {
    let alpha = max_loss_weight.clamp(0.0, 1.0);
    let blended_loss = avg_loss * (1.0 - alpha) + max_loss * alpha;
    adjusted_win_rate * avg_win + (1.0 - adjusted_win_rate) * blended_loss
}

/// Weighted confidence score in [0, 100].
///
/// 40 × sample-size factor, 30 × min(1, |consistency| / 2), 20 if significant,
/// and up to 10 for a win rate between 50% and 60%.
pub fn confidence_score(
    sample_size_factor: f64,
    consistency: f64,
    is_significant: bool,
    adjusted_win_rate: f64,
) -> f64 {
    let size_points = 40.0 * sample_size_factor.clamp(0.0, 1.0);
    let consistency_points = 30.0 * (consistency.abs() / 2.0).min(1.0);
    let significance_points = if is_significant { 20.0 } else { 0.0 };
    let win_rate_points = if adjusted_win_rate >= 0.6 {
        10.0
    } else if adjusted_win_rate > 0.5 {
        (adjusted_win_rate - 0.5) / 0.1 * 10.0
    } else {
        0.0
    };

    let total = size_points + consistency_points + significance_points + win_rate_points;
    if total.is_finite() {
        total.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

// ─── Aggregate ───────────────────────────────────────────────────────

/// Compute every robust statistic for a return sample.
///
/// Pure: the same input always produces the same output.
pub fn calculate_robust_stats(returns: &[f64], config: &RobustStatsConfig) -> RobustStatistics {
    let n = returns.len();
    let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
    let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();

    let raw_win_rate = if n == 0 {
        0.0
    } else {
        wins.len() as f64 / n as f64
    };
    let adjusted_win_rate = bayesian_win_rate(wins.len(), n);
    let avg_win = mean(&wins);
    let avg_loss = mean(&losses);
    let worst_loss = losses.iter().copied().fold(0.0_f64, f64::min);

    let consistency = return_consistency(returns);
    let significance = statistical_significance(returns, config.alpha);
    let size_factor = sample_size_factor(n, config);
    let ev = pessimistic_ev(
        adjusted_win_rate,
        avg_win,
        avg_loss,
        worst_loss,
        config.max_loss_weight,
    );

    RobustStatistics {
        sample_size: n,
        raw_win_rate,
        raw_mean_return: consistency.mean,
        adjusted_win_rate,
        avg_win,
        avg_loss,
        std_dev: consistency.std,
        consistency: consistency.ratio,
        t_statistic: significance.t_statistic,
        p_value: significance.p_value,
        is_significant: significance.is_significant,
        sample_size_factor: size_factor,
        worst_loss,
        pessimistic_ev: ev,
        confidence_score: confidence_score(
            size_factor,
            consistency.ratio,
            significance.is_significant,
            adjusted_win_rate,
        ),
    }
}

/// Composite ranking score in [0, 100].
///
/// Pessimistic EV is normalized so a 10% EV scores 100 (floored at 0),
/// consistency so 2.0 scores 100, significance is 0 or 100.
pub fn robust_score(stats: &RobustStatistics, weights: &ScoreWeights) -> f64 {
    let ev_points = (stats.pessimistic_ev / 0.10 * 100.0).clamp(0.0, 100.0);
    let consistency_points = (stats.consistency / 2.0 * 100.0).clamp(0.0, 100.0);
    let significance_points = if stats.is_significant { 100.0 } else { 0.0 };

    let score = weights.confidence * stats.confidence_score
        + weights.pessimistic_ev * ev_points
        + weights.consistency * consistency_points
        + weights.significance * significance_points;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
