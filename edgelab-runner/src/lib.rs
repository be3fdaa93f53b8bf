//! EdgeLab Runner — walk-forward validation, Monte Carlo, analysis pipeline.
//!
//! This crate builds on `edgelab-core` to provide:
//! - Rolling train/test walk-forward validation with degradation analysis
//! - Parallel, seeded Monte Carlo drawdown simulation under fractional Kelly
//! - TOML-backed configuration for every stage
//! - The end-to-end per-pattern and per-family analysis pipeline

pub mod analysis;
pub mod config;
pub mod monte_carlo;
pub mod walk_forward;

pub use analysis::{
    analyze_family, analyze_pattern, register_actionable, AnalysisError, PatternInput,
    PatternReport,
};
pub use config::{AnalysisConfig, ConfigError};
pub use monte_carlo::{
    recommend_kelly_adjustment, KellyAdjustment, MonteCarloConfig, MonteCarloSimulator,
    SimulationError, SimulationResult, SimulationSummary, TradingStats,
};
pub use walk_forward::{
    OosValidation, OosWindow, StrategyQuality, WalkForwardConfig, WalkForwardValidator,
};
