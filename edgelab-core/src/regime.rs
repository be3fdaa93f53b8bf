//! Market regime and setup tier — closed classifications that scale sizing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad market stress regime, most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Crisis,
    Stressed,
    Cautious,
    Healthy,
}

impl MarketRegime {
    /// Fraction of the recommended position that may be deployed in this regime.
    pub fn position_multiplier(self) -> f64 {
        match self {
            MarketRegime::Crisis => 0.0,
            MarketRegime::Stressed => 0.25,
            MarketRegime::Cautious => 0.5,
            MarketRegime::Healthy => 1.0,
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketRegime::Crisis => "CRISIS",
            MarketRegime::Stressed => "STRESSED",
            MarketRegime::Cautious => "CAUTIOUS",
            MarketRegime::Healthy => "HEALTHY",
        };
        f.write_str(s)
    }
}

/// Volatility-index levels at or above which each regime applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    pub crisis: f64,
    pub stressed: f64,
    pub cautious: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            crisis: 35.0,
            stressed: 25.0,
            cautious: 18.0,
        }
    }
}

impl RegimeThresholds {
    /// Classify a volatility-index reading. Non-finite readings are treated as crisis.
    pub fn classify(&self, volatility_index: f64) -> MarketRegime {
        if !volatility_index.is_finite() || volatility_index >= self.crisis {
            MarketRegime::Crisis
        } else if volatility_index >= self.stressed {
            MarketRegime::Stressed
        } else if volatility_index >= self.cautious {
            MarketRegime::Cautious
        } else {
            MarketRegime::Healthy
        }
    }
}

/// How a pattern's setup was graded when it was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupTier {
    /// The setup the pattern was built to find.
    #[default]
    Primary,
    /// A weaker variant that fired alongside or instead of the primary setup.
    Secondary,
}

impl SetupTier {
    pub fn position_multiplier(self) -> f64 {
        match self {
            SetupTier::Primary => 1.0,
            SetupTier::Secondary => 0.5,
        }
    }
}
