//! Kelly position sizing — turns a statistical edge into a capped capital fraction.
//!
//! Full Kelly maximizes long-run growth only when the inputs are exact. They
//! never are, so the sizer recommends half or quarter Kelly depending on how
//! aggressive the full fraction is, and every variant is capped at a hard
//! maximum position size before it leaves this module.

use serde::{Deserialize, Serialize};

use crate::regime::{MarketRegime, SetupTier};
use crate::robust_stats::RobustStatistics;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Hard cap on any returned fraction of capital.
    pub max_position_size: f64,
    /// Minimum expected edge per trade (fractional return) worth sizing.
    pub min_edge: f64,
    /// Full Kelly above this is only trusted at quarter scale.
    pub aggressive_kelly: f64,
    /// Full Kelly above this (and up to `aggressive_kelly`) is sized at half scale.
    pub moderate_kelly: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            max_position_size: 0.25,
            min_edge: 0.001,
            aggressive_kelly: 0.15,
            moderate_kelly: 0.05,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Which Kelly variant the sizer recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingRecommendation {
    HalfKelly,
    QuarterKelly,
    Skip,
}

impl SizingRecommendation {
    /// Fraction of full Kelly this recommendation deploys.
    pub fn kelly_multiplier(self) -> f64 {
        match self {
            SizingRecommendation::HalfKelly => 0.5,
            SizingRecommendation::QuarterKelly => 0.25,
            SizingRecommendation::Skip => 0.0,
        }
    }
}

/// Sizing recommendation for one pattern. Every fraction is in
/// `[0, max_position_size]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub pattern: String,
    pub win_rate: f64,
    pub avg_win: f64,
    /// Average loss as a positive magnitude.
    pub avg_loss: f64,
    /// p·avg_win − (1−p)·avg_loss.
    pub expected_edge: f64,
    pub full_kelly: f64,
    pub half_kelly: f64,
    pub quarter_kelly: f64,
    pub recommendation: SizingRecommendation,
    pub setup_tier: SetupTier,
    pub regime: MarketRegime,
    /// Chosen variant × setup multiplier × regime multiplier, capped.
    pub recommended_size: f64,
}

// ─── Kelly formula ───────────────────────────────────────────────────

/// Full Kelly fraction f* = (p·b − q) / b with b = avg_win / avg_loss.
///
/// `avg_loss` is a positive magnitude. Returns 0 for invalid input: win rate
/// outside the open interval (0, 1), non-positive average win or loss, or
/// non-finite values. The result is clamped to [0, 1].
pub fn kelly_fraction(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    let valid = win_rate.is_finite()
        && avg_win.is_finite()
        && avg_loss.is_finite()
        && win_rate > 0.0
        && win_rate < 1.0
        && avg_win > 0.0
        && avg_loss > 0.0;
    if !valid {
        return 0.0;
    }

    let b = avg_win / avg_loss;
    let q = 1.0 - win_rate;
    ((win_rate * b - q) / b).clamp(0.0, 1.0)
}

/// Expected return per trade, `avg_loss` as a positive magnitude.
pub fn expected_edge(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    win_rate * avg_win - (1.0 - win_rate) * avg_loss
}

/// Cap a fraction into `[0, max]`. NaN maps to 0.
pub fn cap_fraction(fraction: f64, max: f64) -> f64 {
    if fraction.is_nan() {
        return 0.0;
    }
    fraction.clamp(0.0, max.max(0.0))
}

// ─── Sizer ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Pick the Kelly variant for a given edge and uncapped full Kelly.
    pub fn recommend(&self, edge: f64, full_kelly: f64) -> SizingRecommendation {
        if !(edge >= self.config.min_edge) {
            SizingRecommendation::Skip
        } else if full_kelly > self.config.aggressive_kelly {
            SizingRecommendation::QuarterKelly
        } else if full_kelly > self.config.moderate_kelly {
            SizingRecommendation::HalfKelly
        } else if full_kelly > 0.0 {
            SizingRecommendation::QuarterKelly
        } else {
            SizingRecommendation::Skip
        }
    }

    /// Size a pattern from its win rate and average win/loss magnitudes.
    pub fn size(
        &self,
        pattern: &str,
        win_rate: f64,
        avg_win: f64,
        avg_loss: f64,
        setup_tier: SetupTier,
        regime: MarketRegime,
    ) -> PositionSize {
        let max = self.config.max_position_size;
        let raw_kelly = kelly_fraction(win_rate, avg_win, avg_loss);
        let edge = expected_edge(win_rate, avg_win, avg_loss);
        let recommendation = self.recommend(edge, raw_kelly);

        let variant = cap_fraction(raw_kelly * recommendation.kelly_multiplier(), max);
        let recommended_size = cap_fraction(
            variant * setup_tier.position_multiplier() * regime.position_multiplier(),
            max,
        );

        PositionSize {
            pattern: pattern.to_string(),
            win_rate,
            avg_win,
            avg_loss,
            expected_edge: edge,
            full_kelly: cap_fraction(raw_kelly, max),
            half_kelly: cap_fraction(raw_kelly * 0.5, max),
            quarter_kelly: cap_fraction(raw_kelly * 0.25, max),
            recommendation,
            setup_tier,
            regime,
            recommended_size,
        }
    }

    /// Size a pattern from its robust statistics, using the smoothed win rate.
    pub fn from_robust_stats(
        &self,
        pattern: &str,
        stats: &RobustStatistics,
        setup_tier: SetupTier,
        regime: MarketRegime,
    ) -> PositionSize {
        self.size(
            pattern,
            stats.adjusted_win_rate,
            stats.avg_win,
            stats.avg_loss.abs(),
            setup_tier,
            regime,
        )
    }
}
