//! EdgeLab Core — robust trade statistics, Kelly sizing, dynamic risk control.
//!
//! This crate holds the pure math of the research toolkit:
//! - Return-series metrics (Sharpe, drawdown, percentiles)
//! - One-tailed significance tests and Benjamini-Hochberg correction
//! - Bias-corrected robust statistics and composite scores
//! - Fractional Kelly position sizing with hard caps
//! - Per-pattern dynamic risk controller
//! - Market regime and setup tier classifications
//! - Price series validation, sample fingerprints, seeded RNG hierarchy
//!
//! Nothing here performs I/O or draws random numbers on its own; simulation
//! and walk-forward orchestration live in `edgelab-runner`.

pub mod fingerprint;
pub mod kelly;
pub mod metrics;
pub mod regime;
pub mod risk_controller;
pub mod rng;
pub mod robust_stats;
pub mod series;
pub mod significance;

pub use fingerprint::SampleFingerprint;
pub use kelly::{kelly_fraction, PositionSize, PositionSizer, SizingConfig, SizingRecommendation};
pub use regime::{MarketRegime, RegimeThresholds, SetupTier};
pub use risk_controller::{
    DynamicRiskController, ExpectedPerformance, PatternRiskStatus, RiskError, RiskLimits,
    StatusReason,
};
pub use rng::SeedHierarchy;
pub use robust_stats::{
    bayesian_win_rate, calculate_robust_stats, confidence_score, pessimistic_ev,
    return_consistency, robust_score, sample_size_factor, statistical_significance,
    RobustStatistics, RobustStatsConfig, ScoreWeights,
};
pub use series::{signals_from_indices, PriceSeries, SeriesError};
pub use significance::{benjamini_hochberg, FdrResult, PatternFamily, Significance};
