//! End-to-end pattern analysis.
//!
//! Chains, per pattern: robust statistics → robust score → optional
//! walk-forward → position size → Monte Carlo stress test → Kelly
//! adjustment. A family of patterns additionally gets Benjamini-Hochberg
//! correction across all of their p-values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::fingerprint::SampleFingerprint;
use edgelab_core::kelly::{PositionSize, PositionSizer, SizingRecommendation};
use edgelab_core::metrics::TRADING_DAYS_PER_YEAR;
use edgelab_core::regime::SetupTier;
use edgelab_core::risk_controller::{DynamicRiskController, ExpectedPerformance};
use edgelab_core::robust_stats::{calculate_robust_stats, robust_score, RobustStatistics};
use edgelab_core::significance::{FdrResult, PatternFamily};

use crate::config::AnalysisConfig;
use crate::monte_carlo::{
    recommend_kelly_adjustment, KellyAdjustment, MonteCarloSimulator, SimulationError,
    SimulationSummary, TradingStats,
};
use crate::walk_forward::{OosValidation, WalkForwardValidator};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("simulation failed for pattern {pattern}: {source}")]
    Simulation {
        pattern: String,
        #[source]
        source: SimulationError,
    },
}

/// One pattern to analyze.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternInput {
    pub name: String,
    #[serde(default)]
    pub setup_tier: SetupTier,
    /// Forward returns of every occurrence, as fractions.
    pub returns: Vec<f64>,
    /// Daily closes for walk-forward validation.
    #[serde(default)]
    pub prices: Option<Vec<f64>>,
    /// Position array aligned with `prices`. Buy-and-hold when absent.
    #[serde(default)]
    pub signals: Option<Vec<f64>>,
}

/// Everything learned about one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub pattern: String,
    pub fingerprint: SampleFingerprint,
    pub stats: RobustStatistics,
    pub robust_score: f64,
    /// BH-adjusted p-value; only set when analyzed as part of a family.
    pub fdr_adjusted_p: Option<f64>,
    pub significant_after_fdr: Option<bool>,
    pub walk_forward: Option<OosValidation>,
    pub position: PositionSize,
    pub simulation: Option<SimulationSummary>,
    pub kelly_adjustment: Option<KellyAdjustment>,
    /// Expected trades per year, carried for downstream risk registration.
    pub trades_per_year: f64,
}

impl PatternReport {
    /// Whether the pattern cleared every gate that was applied to it.
    pub fn is_actionable(&self) -> bool {
        self.position.recommended_size > 0.0
            && self.walk_forward.as_ref().map_or(true, |w| w.tradable)
            && self.significant_after_fdr.unwrap_or(true)
    }

    /// Expected daily performance implied by the sample and trade frequency.
    ///
    /// Annualized Sharpe scales the per-trade consistency by √trades; the
    /// mean daily return spreads the per-trade mean over 252 days.
    pub fn expected_performance(&self) -> ExpectedPerformance {
        let trades = self.trades_per_year.max(0.0);
        ExpectedPerformance {
            sharpe: self.stats.consistency * trades.sqrt(),
            mean_return: self.stats.raw_mean_return * trades / TRADING_DAYS_PER_YEAR,
        }
    }
}

// ─── Single pattern ──────────────────────────────────────────────────

pub fn analyze_pattern(
    input: &PatternInput,
    config: &AnalysisConfig,
) -> Result<PatternReport, AnalysisError> {
    let stats = calculate_robust_stats(&input.returns, &config.robust);
    let score = robust_score(&stats, &config.score_weights);

    let walk_forward = input.prices.as_deref().map(|prices| {
        let validator = WalkForwardValidator::new(config.walk_forward.clone());
        match input.signals.as_deref() {
            Some(signals) => validator.validate_with_signals(prices, signals),
            None => validator.validate(prices),
        }
    });

    let regime = config.market_regime();
    let sizer = PositionSizer::new(config.sizing.clone());
    let position = sizer.from_robust_stats(&input.name, &stats, input.setup_tier, regime);

    let oos_ok = walk_forward.as_ref().map_or(true, |w| w.tradable);
    let simulate = oos_ok && position.recommendation != SizingRecommendation::Skip;
    let (simulation, kelly_adjustment) = if simulate {
        let fraction = position.recommendation.kelly_multiplier();
        let trading = TradingStats::from_robust_stats(&stats, config.trades_per_year, fraction);
        let result = MonteCarloSimulator::new(config.monte_carlo.clone())
            .run(&trading)
            .map_err(|source| AnalysisError::Simulation {
                pattern: input.name.clone(),
                source,
            })?;
        let adjustment = recommend_kelly_adjustment(&result.summary, fraction);
        (Some(result.summary), Some(adjustment))
    } else {
        (None, None)
    };

    let fingerprint = SampleFingerprint::of(&input.name, &input.returns);
    tracing::debug!(
        pattern = %input.name,
        sample = %fingerprint.short(),
        n = stats.sample_size,
        score,
        recommendation = ?position.recommendation,
        simulated = simulation.is_some(),
        "pattern analyzed"
    );

    Ok(PatternReport {
        pattern: input.name.clone(),
        fingerprint,
        stats,
        robust_score: score,
        fdr_adjusted_p: None,
        significant_after_fdr: None,
        walk_forward,
        position,
        simulation,
        kelly_adjustment,
        trades_per_year: config.trades_per_year,
    })
}

// ─── Pattern family ──────────────────────────────────────────────────

/// Analyze every pattern, apply BH correction across the family, and sort
/// by robust score descending (ties by name).
pub fn analyze_family(
    inputs: &[PatternInput],
    config: &AnalysisConfig,
) -> Result<Vec<PatternReport>, AnalysisError> {
    let mut reports = inputs
        .iter()
        .map(|input| analyze_pattern(input, config))
        .collect::<Result<Vec<_>, _>>()?;

    let mut family = PatternFamily::new();
    for report in &reports {
        family.add(report.pattern.clone(), report.stats.p_value);
    }
    // Corrections come back ordered by raw p-value; pattern names are the key
    let corrections: HashMap<String, FdrResult> = family
        .apply_correction(config.fdr_alpha)
        .into_iter()
        .map(|fdr| (fdr.pattern.clone(), fdr))
        .collect();
    for report in &mut reports {
        if let Some(fdr) = corrections.get(&report.pattern) {
            report.fdr_adjusted_p = Some(fdr.adjusted_p);
            report.significant_after_fdr = Some(fdr.significant);
        }
    }

    reports.sort_by(|a, b| {
        b.robust_score
            .total_cmp(&a.robust_score)
            .then_with(|| a.pattern.cmp(&b.pattern))
    });

    let survivors = reports.iter().filter(|r| r.significant_after_fdr == Some(true)).count();
    tracing::debug!(patterns = reports.len(), survivors, "family analyzed");
    Ok(reports)
}

/// Register every actionable report with a risk controller at its
/// recommended size. Returns how many were registered.
pub fn register_actionable(
    reports: &[PatternReport],
    controller: &mut DynamicRiskController,
) -> usize {
    let mut registered = 0;
    for report in reports.iter().filter(|r| r.is_actionable()) {
        controller.register(
            report.pattern.clone(),
            report.position.recommended_size,
            report.expected_performance(),
        );
        registered += 1;
    }
    registered
}
