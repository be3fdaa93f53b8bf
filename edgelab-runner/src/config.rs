//! TOML-backed analysis configuration.
//!
//! Every section is optional in the file; missing keys fall back to the
//! documented defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::kelly::SizingConfig;
use edgelab_core::regime::{MarketRegime, RegimeThresholds};
use edgelab_core::risk_controller::RiskLimits;
use edgelab_core::robust_stats::{RobustStatsConfig, ScoreWeights};
use edgelab_core::significance::DEFAULT_ALPHA;

use crate::monte_carlo::MonteCarloConfig;
use crate::walk_forward::WalkForwardConfig;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the whole analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Expected trades per year, used as the simulated trade count.
    pub trades_per_year: f64,
    /// Family-wise FDR level for Benjamini-Hochberg correction.
    pub fdr_alpha: f64,
    /// Current volatility-index reading. Absent means a healthy market.
    pub volatility_index: Option<f64>,
    /// Bars a position is held after each pattern fire, for signal mode.
    pub hold_days: usize,
    pub robust: RobustStatsConfig,
    pub score_weights: ScoreWeights,
    pub walk_forward: WalkForwardConfig,
    pub monte_carlo: MonteCarloConfig,
    pub sizing: SizingConfig,
    pub risk: RiskLimits,
    pub regime: RegimeThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            trades_per_year: 50.0,
            fdr_alpha: DEFAULT_ALPHA,
            volatility_index: None,
            hold_days: 5,
            robust: RobustStatsConfig::default(),
            score_weights: ScoreWeights::default(),
            walk_forward: WalkForwardConfig::default(),
            monte_carlo: MonteCarloConfig::default(),
            sizing: SizingConfig::default(),
            risk: RiskLimits::default(),
            regime: RegimeThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded analysis config");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Regime implied by the configured volatility reading.
    pub fn market_regime(&self) -> MarketRegime {
        self.volatility_index
            .map_or(MarketRegime::Healthy, |v| self.regime.classify(v))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(self.trades_per_year.is_finite() && self.trades_per_year >= 0.0) {
            return invalid(format!("trades_per_year must be >= 0, got {}", self.trades_per_year));
        }
        for (name, alpha) in [("fdr_alpha", self.fdr_alpha), ("robust.alpha", self.robust.alpha)] {
            if !(alpha > 0.0 && alpha < 1.0) {
                return invalid(format!("{name} must be in (0, 1), got {alpha}"));
            }
        }

        let r = &self.robust;
        if !(r.critical_sample < r.moderate_sample && r.moderate_sample < r.good_sample) {
            return invalid(format!(
                "sample thresholds must be strictly ordered, got {} / {} / {}",
                r.critical_sample, r.moderate_sample, r.good_sample
            ));
        }
        if !(0.0..=1.0).contains(&r.max_loss_weight) {
            return invalid(format!(
                "robust.max_loss_weight must be in [0, 1], got {}",
                r.max_loss_weight
            ));
        }

        let wf = &self.walk_forward;
        if wf.train_days == 0 || wf.test_days == 0 || wf.step_days == 0 {
            return invalid("walk_forward window sizes must be > 0".into());
        }

        self.monte_carlo
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if !(self.sizing.max_position_size > 0.0 && self.sizing.max_position_size <= 1.0) {
            return invalid(format!(
                "sizing.max_position_size must be in (0, 1], got {}",
                self.sizing.max_position_size
            ));
        }
        if self.risk.min_multiplier > self.risk.max_multiplier {
            return invalid("risk.min_multiplier must not exceed risk.max_multiplier".into());
        }
        if self.risk.lookback_days < 2 {
            return invalid("risk.lookback_days must be at least 2".into());
        }

        let t = &self.regime;
        if !(t.cautious <= t.stressed && t.stressed <= t.crisis) {
            return invalid("regime thresholds must satisfy cautious <= stressed <= crisis".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.walk_forward.train_days, 252);
        assert_eq!(config.monte_carlo.num_simulations, 10_000);
        assert_eq!(config.market_regime(), MarketRegime::Healthy);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(AnalysisConfig::from_toml_str("").unwrap(), AnalysisConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            trades_per_year = 24.0
            volatility_index = 27.5

            [walk_forward]
            train_days = 126

            [monte_carlo]
            seed = 7
            num_simulations = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.trades_per_year, 24.0);
        assert_eq!(config.walk_forward.train_days, 126);
        assert_eq!(config.walk_forward.test_days, 63);
        assert_eq!(config.monte_carlo.seed, Some(7));
        assert_eq!(config.monte_carlo.return_noise, 0.3);
        assert_eq!(config.market_regime(), MarketRegime::Stressed);
    }

    #[test]
    fn unordered_sample_thresholds_rejected() {
        let err = AnalysisConfig::from_toml_str("[robust]\nmoderate_sample = 40\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_window_rejected() {
        let err = AnalysisConfig::from_toml_str("[walk_forward]\ntest_days = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = AnalysisConfig::from_toml_str("trades_per_year = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_text_reloads_identically() {
        let mut config = AnalysisConfig::default();
        config.monte_carlo.seed = Some(11);
        config.volatility_index = Some(20.0);
        let text = config.to_toml_string().unwrap();
        assert_eq!(AnalysisConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fdr_alpha = 0.1\n[sizing]\nmax_position_size = 0.2").unwrap();
        let config = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(config.fdr_alpha, 0.1);
        assert_eq!(config.sizing.max_position_size, 0.2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AnalysisConfig::load("/nonexistent/edgelab.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
