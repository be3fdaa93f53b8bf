//! Monte Carlo drawdown simulation under fractional Kelly sizing.
//!
//! Each path replays a trading horizon of `time_periods` periods. Per period
//! the number of trades is Poisson-distributed around
//! `num_trades / time_periods`; each trade wins with probability `win_rate`
//! and earns `avg_win` or `avg_loss` (percent) scaled by `1 + N(0, noise)`.
//! Capital is recorded at the end of every period, starting from the initial
//! value, and a path that reaches zero stays at zero.
//!
//! Paths run in parallel via rayon. Each path gets its own RNG derived from
//! the batch master seed, so a seeded run is bit-identical at any thread count.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::metrics::{mean, percentile_sorted, sorted_copy};
use edgelab_core::robust_stats::RobustStatistics;
use edgelab_core::rng::SeedHierarchy;

/// A path whose max drawdown exceeds this (percent) counts as ruined.
pub const RUIN_DRAWDOWN_PCT: f64 = 50.0;

/// Ceiling for any Kelly recommendation produced by the adjustment rule.
pub const MAX_RECOMMENDED_KELLY: f64 = 0.5;

// ─── Inputs ──────────────────────────────────────────────────────────

/// Per-trade statistics driving the simulation. Returns are in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingStats {
    /// Probability of a winning trade, in [0, 1].
    pub win_rate: f64,
    /// Mean winning trade return, percent (>= 0).
    pub avg_win: f64,
    /// Mean losing trade return, percent (<= 0).
    pub avg_loss: f64,
    /// Expected trades over the whole horizon.
    pub num_trades: f64,
    /// Fraction of the optimal Kelly bet to take (e.g. 0.25 = quarter Kelly).
    pub kelly_fraction: f64,
}

impl TradingStats {
    /// Build from robust statistics (fractional returns become percent).
    pub fn from_robust_stats(
        stats: &RobustStatistics,
        num_trades: f64,
        kelly_fraction: f64,
    ) -> Self {
        Self {
            win_rate: stats.adjusted_win_rate,
            avg_win: stats.avg_win * 100.0,
            avg_loss: stats.avg_loss * 100.0,
            num_trades,
            kelly_fraction,
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let finite = [
            self.win_rate,
            self.avg_win,
            self.avg_loss,
            self.num_trades,
            self.kelly_fraction,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(SimulationError::InvalidStats("all statistics must be finite".into()));
        }
        if !(0.0..=1.0).contains(&self.win_rate) {
            return Err(SimulationError::InvalidStats(format!(
                "win_rate must be in [0, 1], got {}",
                self.win_rate
            )));
        }
        if self.avg_win < 0.0 {
            return Err(SimulationError::InvalidStats(format!(
                "avg_win must be >= 0, got {}",
                self.avg_win
            )));
        }
        if self.avg_loss > 0.0 {
            return Err(SimulationError::InvalidStats(format!(
                "avg_loss must be <= 0, got {}",
                self.avg_loss
            )));
        }
        if self.num_trades < 0.0 || self.kelly_fraction < 0.0 {
            return Err(SimulationError::InvalidStats(
                "num_trades and kelly_fraction must be >= 0".into(),
            ));
        }
        Ok(())
    }

    /// Expected return per trade, percent.
    pub fn edge(&self) -> f64 {
        self.win_rate * self.avg_win + (1.0 - self.win_rate) * self.avg_loss
    }

    /// Static position fraction: `kelly_fraction × edge / avg_win`, clamped to `[0, cap]`.
    ///
    /// Zero when the edge is non-positive or there is no winning payoff.
    pub fn position_fraction(&self, cap: f64) -> f64 {
        let edge = self.edge();
        if edge <= 0.0 || self.avg_win <= 0.0 {
            return 0.0;
        }
        let optimal = edge / self.avg_win;
        (optimal * self.kelly_fraction).clamp(0.0, cap.max(0.0))
    }
}

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub initial_capital: f64,
    /// Periods per path (default 252 trading days).
    pub time_periods: usize,
    pub num_simulations: usize,
    /// Master seed. `None` draws one from entropy, fixed for the batch.
    pub seed: Option<u64>,
    /// Hard cap on the fraction of capital risked per trade.
    pub max_position_per_trade: f64,
    /// Standard deviation of the multiplicative return noise.
    pub return_noise: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            time_periods: 252,
            num_simulations: 10_000,
            seed: None,
            max_position_per_trade: 0.10,
            return_noise: 0.3,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.time_periods == 0 || self.num_simulations == 0 {
            return Err(SimulationError::InvalidConfig(
                "time_periods and num_simulations must be > 0".into(),
            ));
        }
        let cap = self.max_position_per_trade;
        if !(cap.is_finite() && (0.0..=1.0).contains(&cap)) {
            return Err(SimulationError::InvalidConfig(format!(
                "max_position_per_trade must be in [0, 1], got {}",
                self.max_position_per_trade
            )));
        }
        if !(self.return_noise.is_finite() && self.return_noise >= 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "return_noise must be >= 0, got {}",
                self.return_noise
            )));
        }
        Ok(())
    }
}

/// Errors from a simulation batch.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid trading stats: {0}")]
    InvalidStats(String),

    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    #[error("distribution setup failed: {0}")]
    Distribution(String),
}

// ─── Results ─────────────────────────────────────────────────────────

/// Full batch output. `final_capitals` and `max_drawdowns` are indexed by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub final_capitals: Vec<f64>,
    /// Per-path max drawdown, percent.
    pub max_drawdowns: Vec<f64>,
    pub summary: SimulationSummary,
}

/// Aggregate statistics of a batch, without per-path arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub seed: u64,
    pub num_simulations: usize,
    pub time_periods: usize,
    pub initial_capital: f64,
    /// Static per-trade fraction used on every path.
    pub position_fraction: f64,
    pub worst_drawdown: f64,
    pub median_max_drawdown: f64,
    /// Median total return, percent.
    pub median_return: f64,
    pub mean_return: f64,
    pub prob_ruin: f64,
    pub prob_drawdown_20: f64,
    pub prob_drawdown_30: f64,
    pub percentile_5_return: f64,
    pub percentile_95_return: f64,
}

// ─── Kelly adjustment ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KellyAdjustment {
    Reduce { from: f64, to: f64 },
    Increase { from: f64, to: f64 },
    Hold { fraction: f64 },
}

impl KellyAdjustment {
    pub fn recommended(&self) -> f64 {
        match *self {
            KellyAdjustment::Reduce { to, .. } | KellyAdjustment::Increase { to, .. } => to,
            KellyAdjustment::Hold { fraction } => fraction,
        }
    }
}

/// Nudge the Kelly fraction based on simulated drawdown risk.
///
/// More than 30% of paths breaching a 20% drawdown cuts the fraction by 30%;
/// fewer than 15% allows a 20% increase, capped at 0.5.
pub fn recommend_kelly_adjustment(summary: &SimulationSummary, current: f64) -> KellyAdjustment {
    if summary.prob_drawdown_20 > 0.30 {
        KellyAdjustment::Reduce { from: current, to: current * 0.7 }
    } else if summary.prob_drawdown_20 < 0.15 {
        let to = (current * 1.2).min(MAX_RECOMMENDED_KELLY);
        if to > current {
            KellyAdjustment::Increase { from: current, to }
        } else {
            KellyAdjustment::Hold { fraction: current }
        }
    } else {
        KellyAdjustment::Hold { fraction: current }
    }
}

// ─── Simulator ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

/// Distributions shared by every path of a batch.
struct PathModel {
    trades_per_period: Option<Poisson<f64>>,
    noise: Normal<f64>,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    fraction: f64,
    initial_capital: f64,
    time_periods: usize,
}

impl MonteCarloSimulator {
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, stats: &TradingStats) -> Result<SimulationResult, SimulationError> {
        stats.validate()?;
        self.config.validate()?;

        let seeds = SeedHierarchy::from_optional(self.config.seed);
        let lambda = stats.num_trades / self.config.time_periods as f64;
        let trades_per_period = if lambda > 0.0 {
            Some(Poisson::new(lambda).map_err(|e| SimulationError::Distribution(e.to_string()))?)
        } else {
            None
        };
        let noise = Normal::new(0.0, self.config.return_noise)
            .map_err(|e| SimulationError::Distribution(e.to_string()))?;

        let model = PathModel {
            trades_per_period,
            noise,
            win_rate: stats.win_rate,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            fraction: stats.position_fraction(self.config.max_position_per_trade),
            initial_capital: self.config.initial_capital,
            time_periods: self.config.time_periods,
        };

        tracing::debug!(
            seed = seeds.master_seed(),
            paths = self.config.num_simulations,
            fraction = model.fraction,
            "monte carlo batch starting"
        );

        let paths: Vec<(f64, f64)> = (0..self.config.num_simulations)
            .into_par_iter()
            .map(|i| {
                let mut rng = seeds.rng_for(i as u64);
                simulate_path(&model, &mut rng)
            })
            .collect();
        let (final_capitals, max_drawdowns): (Vec<f64>, Vec<f64>) = paths.into_iter().unzip();

        let summary = summarize(
            &self.config,
            seeds.master_seed(),
            model.fraction,
            &final_capitals,
            &max_drawdowns,
        );
        tracing::debug!(
            median_return = summary.median_return,
            prob_dd_20 = summary.prob_drawdown_20,
            prob_ruin = summary.prob_ruin,
            "monte carlo batch complete"
        );

        Ok(SimulationResult {
            final_capitals,
            max_drawdowns,
            summary,
        })
    }
}

/// One path. Returns `(final_capital, max_drawdown_pct)`.
fn simulate_path(model: &PathModel, rng: &mut StdRng) -> (f64, f64) {
    let mut capital = model.initial_capital;
    let mut peak = capital;
    let mut max_dd = 0.0_f64;

    for _ in 0..model.time_periods {
        if capital > 0.0 {
            let trades = match &model.trades_per_period {
                Some(poisson) => poisson.sample(rng) as u64,
                None => 0,
            };
            for _ in 0..trades {
                let won = rng.gen_bool(model.win_rate);
                let scale = 1.0 + model.noise.sample(rng);
                let payoff = if won { model.avg_win } else { model.avg_loss };
                let trade_return = payoff * scale;
                capital += capital * model.fraction * trade_return / 100.0;
                if capital <= 0.0 {
                    capital = 0.0;
                    break;
                }
            }
        }

        peak = peak.max(capital);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - capital) / peak * 100.0);
        }
    }

    (capital, max_dd)
}

fn summarize(
    config: &MonteCarloConfig,
    seed: u64,
    position_fraction: f64,
    final_capitals: &[f64],
    max_drawdowns: &[f64],
) -> SimulationSummary {
    let n = final_capitals.len() as f64;
    let returns: Vec<f64> = final_capitals
        .iter()
        .map(|c| (c / config.initial_capital - 1.0) * 100.0)
        .collect();
    let sorted_returns = sorted_copy(&returns);
    let sorted_dd = sorted_copy(max_drawdowns);
    let share_above = |limit: f64| max_drawdowns.iter().filter(|&&d| d > limit).count() as f64 / n;

    SimulationSummary {
        seed,
        num_simulations: final_capitals.len(),
        time_periods: config.time_periods,
        initial_capital: config.initial_capital,
        position_fraction,
        worst_drawdown: sorted_dd.last().copied().unwrap_or(0.0),
        median_max_drawdown: percentile_sorted(&sorted_dd, 50.0),
        median_return: percentile_sorted(&sorted_returns, 50.0),
        mean_return: mean(&returns),
        prob_ruin: share_above(RUIN_DRAWDOWN_PCT),
        prob_drawdown_20: share_above(20.0),
        prob_drawdown_30: share_above(30.0),
        percentile_5_return: percentile_sorted(&sorted_returns, 5.0),
        percentile_95_return: percentile_sorted(&sorted_returns, 95.0),
    }
}
