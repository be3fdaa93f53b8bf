//! Dynamic risk control — per-pattern enable/disable and damped Kelly rescaling.
//!
//! The controller is a value the caller owns and threads through each
//! periodic update. Each registered pattern carries its own two-state
//! machine: enabled (base Kelly × adjustment factor) or disabled (zero size).
//! A pattern is disabled for the current cycle when its trailing drawdown or
//! Sharpe breaches a limit, and re-evaluated from scratch on the next update.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kelly::cap_fraction;
use crate::metrics::{annualized_sharpe, equity_path, max_drawdown_fraction, mean};

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Trailing window of realized daily returns evaluated on each update.
    pub lookback_days: usize,
    /// Realized drawdown (fraction) above which the pattern is disabled.
    pub max_drawdown: f64,
    /// Realized annualized Sharpe below which the pattern is disabled.
    pub min_sharpe: f64,
    /// Performance score above this scales Kelly up.
    pub increase_threshold: f64,
    /// Performance score below this scales Kelly down.
    pub decrease_threshold: f64,
    pub max_multiplier: f64,
    pub min_multiplier: f64,
    pub sharpe_weight: f64,
    pub return_weight: f64,
    /// Hard cap on the adjusted Kelly fraction.
    pub max_position_size: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            lookback_days: 60,
            max_drawdown: 0.20,
            min_sharpe: 0.5,
            increase_threshold: 1.2,
            decrease_threshold: 0.7,
            max_multiplier: 1.3,
            min_multiplier: 0.2,
            sharpe_weight: 0.7,
            return_weight: 0.3,
            max_position_size: 0.25,
        }
    }
}

/// What the pattern was expected to deliver when it was registered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedPerformance {
    /// Annualized Sharpe.
    pub sharpe: f64,
    /// Mean daily return.
    pub mean_return: f64,
}

// ─── State ───────────────────────────────────────────────────────────

/// Why a pattern is in its current state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusReason {
    /// Registered, not yet evaluated.
    Initial,
    /// Not enough realized returns in the lookback to evaluate.
    InsufficientHistory { observations: usize },
    WithinLimits,
    Increased { score: f64 },
    Decreased { score: f64 },
    DrawdownExceeded { drawdown: f64, limit: f64 },
    SharpeBelowMinimum { sharpe: f64, limit: f64 },
}

impl fmt::Display for StatusReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusReason::Initial => write!(f, "registered"),
            StatusReason::InsufficientHistory { observations } => {
                write!(f, "insufficient history ({observations} observations)")
            }
            StatusReason::WithinLimits => write!(f, "within limits"),
            StatusReason::Increased { score } => {
                write!(f, "outperforming (score {score:.2}), Kelly increased")
            }
            StatusReason::Decreased { score } => {
                write!(f, "underperforming (score {score:.2}), Kelly decreased")
            }
            StatusReason::DrawdownExceeded { drawdown, limit } => write!(
                f,
                "drawdown {:.1}% exceeds limit {:.1}%",
                drawdown * 100.0,
                limit * 100.0
            ),
            StatusReason::SharpeBelowMinimum { sharpe, limit } => {
                write!(f, "Sharpe {sharpe:.2} below minimum {limit:.2}")
            }
        }
    }
}

/// Mutable risk state for one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRiskStatus {
    pub pattern: String,
    pub enabled: bool,
    /// Kelly fraction the pattern was registered with.
    pub base_kelly: f64,
    /// base_kelly × adjustment_factor, capped; 0 while disabled.
    pub current_kelly: f64,
    pub adjustment_factor: f64,
    pub reason: StatusReason,
    pub expected: ExpectedPerformance,
    pub realized_sharpe: f64,
    pub realized_drawdown: f64,
    pub realized_mean_return: f64,
    /// Number of updates applied since registration.
    pub updates: u64,
}

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("pattern '{0}' is not registered with the risk controller")]
    UnknownPattern(String),
}

// ─── Controller ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicRiskController {
    limits: RiskLimits,
    states: BTreeMap<String, PatternRiskStatus>,
}

impl DynamicRiskController {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            states: BTreeMap::new(),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Register (or re-register) a pattern, enabled at its base Kelly.
    pub fn register(
        &mut self,
        pattern: impl Into<String>,
        base_kelly: f64,
        expected: ExpectedPerformance,
    ) -> &PatternRiskStatus {
        let pattern = pattern.into();
        let base_kelly = cap_fraction(base_kelly, self.limits.max_position_size);
        let status = PatternRiskStatus {
            pattern: pattern.clone(),
            enabled: true,
            base_kelly,
            current_kelly: base_kelly,
            adjustment_factor: 1.0,
            reason: StatusReason::Initial,
            expected,
            realized_sharpe: 0.0,
            realized_drawdown: 0.0,
            realized_mean_return: 0.0,
            updates: 0,
        };
        self.states.insert(pattern.clone(), status);
        &self.states[&pattern]
    }

    /// Re-evaluate a pattern against its trailing realized daily returns.
    ///
    /// Only the last `lookback_days` returns are considered.
    pub fn update(
        &mut self,
        pattern: &str,
        realized_returns: &[f64],
    ) -> Result<&PatternRiskStatus, RiskError> {
        let limits = self.limits.clone();
        let state = self
            .states
            .get_mut(pattern)
            .ok_or_else(|| RiskError::UnknownPattern(pattern.to_string()))?;

        let start = realized_returns.len().saturating_sub(limits.lookback_days);
        let window = &realized_returns[start..];
        state.updates += 1;

        if window.len() < 2 {
            state.reason = StatusReason::InsufficientHistory {
                observations: window.len(),
            };
            return Ok(state);
        }

        let sharpe = annualized_sharpe(window);
        let drawdown = max_drawdown_fraction(&equity_path(window));
        let mean_return = mean(window);
        state.realized_sharpe = sharpe;
        state.realized_drawdown = drawdown;
        state.realized_mean_return = mean_return;

        let was_enabled = state.enabled;

        let breach = if drawdown > limits.max_drawdown {
            Some(StatusReason::DrawdownExceeded {
                drawdown,
                limit: limits.max_drawdown,
            })
        } else if sharpe < limits.min_sharpe {
            Some(StatusReason::SharpeBelowMinimum {
                sharpe,
                limit: limits.min_sharpe,
            })
        } else {
            None
        };

        if let Some(reason) = breach {
            state.enabled = false;
            state.current_kelly = 0.0;
            state.adjustment_factor = 0.0;
            state.reason = reason;
            tracing::warn!(pattern, %reason, "pattern disabled by risk limit");
            return Ok(state);
        }

        let score = performance_score(&limits, &state.expected, sharpe, mean_return);
        let (factor, reason) = if score > limits.increase_threshold {
            (score.min(limits.max_multiplier), StatusReason::Increased { score })
        } else if score < limits.decrease_threshold {
            (score.max(limits.min_multiplier), StatusReason::Decreased { score })
        } else {
            (1.0, StatusReason::WithinLimits)
        };

        state.enabled = true;
        state.adjustment_factor = factor;
        state.current_kelly = cap_fraction(state.base_kelly * factor, limits.max_position_size);
        state.reason = reason;

        if !was_enabled {
            tracing::info!(pattern, kelly = state.current_kelly, "pattern re-enabled");
        } else if factor != 1.0 {
            tracing::info!(pattern, factor, kelly = state.current_kelly, "Kelly rescaled");
        }

        Ok(state)
    }

    pub fn status(&self, pattern: &str) -> Option<&PatternRiskStatus> {
        self.states.get(pattern)
    }

    /// Current position fraction for a pattern; 0 when disabled or unknown.
    pub fn position_size(&self, pattern: &str) -> f64 {
        self.states
            .get(pattern)
            .filter(|s| s.enabled)
            .map_or(0.0, |s| s.current_kelly)
    }

    pub fn disabled_patterns(&self) -> Vec<&str> {
        self.states
            .values()
            .filter(|s| !s.enabled)
            .map(|s| s.pattern.as_str())
            .collect()
    }
}

/// Weighted realized/expected ratio. A non-positive expectation contributes a
/// neutral 1.0 for its component.
fn performance_score(
    limits: &RiskLimits,
    expected: &ExpectedPerformance,
    realized_sharpe: f64,
    realized_mean: f64,
) -> f64 {
    let ratio = |realized: f64, expected: f64| {
        if expected > 0.0 && expected.is_finite() {
            realized / expected
        } else {
            1.0
        }
    };
    limits.sharpe_weight * ratio(realized_sharpe, expected.sharpe)
        + limits.return_weight * ratio(realized_mean, expected.mean_return)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> ExpectedPerformance {
        ExpectedPerformance {
            sharpe: 1.5,
            mean_return: 0.001,
        }
    }

    /// Alternating returns with a controllable mean and small noise.
    fn returns_with_mean(mean: f64, noise: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| if i % 2 == 0 { mean + noise } else { mean - noise })
            .collect()
    }

    fn controller() -> DynamicRiskController {
        let mut c = DynamicRiskController::new(RiskLimits::default());
        c.register("rally", 0.10, expected());
        c
    }

    #[test]
    fn register_starts_enabled() {
        let c = controller();
        let s = c.status("rally").unwrap();
        assert!(s.enabled);
        assert_eq!(s.reason, StatusReason::Initial);
        assert!((c.position_size("rally") - 0.10).abs() < 1e-12);
    }

    #[test]
    fn register_caps_base_kelly() {
        let mut c = DynamicRiskController::new(RiskLimits::default());
        let s = c.register("wild", 0.9, expected());
        assert!((s.base_kelly - 0.25).abs() < 1e-12);
    }

    #[test]
    fn unknown_pattern_is_an_error() {
        let mut c = controller();
        let err = c.update("nope", &[0.01, 0.02]).unwrap_err();
        assert_eq!(err, RiskError::UnknownPattern("nope".into()));
        assert_eq!(c.position_size("nope"), 0.0);
    }

    #[test]
    fn insufficient_history_keeps_state() {
        let mut c = controller();
        let s = c.update("rally", &[0.01]).unwrap();
        assert!(s.enabled);
        assert_eq!(s.reason, StatusReason::InsufficientHistory { observations: 1 });
        assert!((s.current_kelly - 0.10).abs() < 1e-12);
    }

    #[test]
    fn drawdown_breach_disables() {
        let mut c = controller();
        // Strongly positive noise-free mean, then a crash
        let mut returns = returns_with_mean(0.002, 0.001, 40);
        returns.extend([-0.1, -0.1, -0.1]);
        let s = c.update("rally", &returns).unwrap();
        assert!(!s.enabled);
        assert!(matches!(s.reason, StatusReason::DrawdownExceeded { .. }));
        assert_eq!(s.current_kelly, 0.0);
        assert_eq!(c.position_size("rally"), 0.0);
        assert_eq!(c.disabled_patterns(), vec!["rally"]);
    }

    #[test]
    fn low_sharpe_disables() {
        let mut c = controller();
        let s = c.update("rally", &returns_with_mean(0.0, 0.01, 60)).unwrap();
        assert!(!s.enabled);
        assert!(matches!(s.reason, StatusReason::SharpeBelowMinimum { .. }));
    }

    #[test]
    fn disabled_pattern_recovers_on_next_update() {
        let mut c = controller();
        c.update("rally", &returns_with_mean(-0.002, 0.01, 60)).unwrap();
        assert!(!c.status("rally").unwrap().enabled);

        // mean 0.001, std ≈ 0.0101 → Sharpe ≈ 1.57, ratio ≈ 1.05 → score ≈ 1.03
        let s = c.update("rally", &returns_with_mean(0.001, 0.01, 60)).unwrap();
        assert!(s.enabled);
        assert_eq!(s.reason, StatusReason::WithinLimits);
        assert!((s.current_kelly - 0.10).abs() < 1e-12);
        assert_eq!(s.updates, 2);
    }

    #[test]
    fn outperformance_increases_up_to_cap() {
        let mut c = controller();
        let s = c.update("rally", &returns_with_mean(0.003, 0.001, 60)).unwrap();
        assert!(s.enabled);
        assert!(matches!(s.reason, StatusReason::Increased { .. }));
        assert!((s.adjustment_factor - 1.3).abs() < 1e-12);
        assert!((s.current_kelly - 0.13).abs() < 1e-12);
    }

    #[test]
    fn underperformance_decreases_to_floor() {
        let mut c = DynamicRiskController::new(RiskLimits::default());
        c.register(
            "cross",
            0.10,
            ExpectedPerformance {
                sharpe: 10.0,
                mean_return: 0.05,
            },
        );
        // Sharpe ≈ 0.8 passes the minimum but is far below expectation
        let s = c.update("cross", &returns_with_mean(0.0005, 0.01, 60)).unwrap();
        assert!(s.enabled);
        assert!(matches!(s.reason, StatusReason::Decreased { .. }));
        assert!((s.adjustment_factor - 0.2).abs() < 1e-12);
        assert!((s.current_kelly - 0.02).abs() < 1e-12);
    }

    #[test]
    fn only_lookback_window_is_used() {
        let mut c = controller();
        // An old crash outside the 60-day lookback is ignored
        let mut returns = vec![-0.3, -0.3];
        returns.extend(returns_with_mean(0.001, 0.01, 60));
        let s = c.update("rally", &returns).unwrap();
        assert!(s.enabled);
        assert!(s.realized_drawdown < 0.2);
    }

    #[test]
    fn reason_display_is_readable() {
        let r = StatusReason::DrawdownExceeded {
            drawdown: 0.25,
            limit: 0.2,
        };
        assert_eq!(r.to_string(), "drawdown 25.0% exceeds limit 20.0%");
    }
}
