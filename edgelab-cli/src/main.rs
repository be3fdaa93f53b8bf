//! EdgeLab CLI — robustness statistics, validation, simulation and sizing.
//!
//! Commands:
//! - `stats` — robust statistics and score of a return sample
//! - `walk-forward` — rolling out-of-sample validation of a price series
//! - `simulate` — Monte Carlo drawdown simulation from trade statistics
//! - `size` — fractional Kelly position size for a return sample
//! - `analyze` — the full pipeline over a family of patterns
//! - `risk` — one risk-controller evaluation of realized returns
//! - `config` — print the default configuration as TOML
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr.

mod input;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use edgelab_core::kelly::PositionSizer;
use edgelab_core::regime::SetupTier;
use edgelab_core::risk_controller::{DynamicRiskController, ExpectedPerformance};
use edgelab_core::robust_stats::{calculate_robust_stats, robust_score, RobustStatistics};
use edgelab_core::series::signals_from_indices;
use edgelab_core::SampleFingerprint;
use edgelab_runner::{
    analyze_family, recommend_kelly_adjustment, AnalysisConfig, KellyAdjustment,
    MonteCarloSimulator, SimulationSummary, TradingStats, WalkForwardValidator,
};

#[derive(Parser)]
#[command(
    name = "edgelab",
    about = "EdgeLab CLI — robust pattern statistics, validation and sizing"
)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Robust statistics and composite score of a return sample.
    Stats {
        /// Returns file: JSON array or one-column CSV of fractional returns.
        #[arg(long)]
        returns: PathBuf,

        /// Label used for the sample fingerprint.
        #[arg(long, default_value = "sample")]
        pattern: String,
    },
    /// Walk-forward validation of a `date,close` price series.
    WalkForward {
        /// Prices CSV with `date,close` columns.
        #[arg(long)]
        prices: PathBuf,

        /// JSON array of bar indices at which the pattern fired (signal mode).
        #[arg(long)]
        fires: Option<PathBuf>,
    },
    /// Monte Carlo drawdown simulation from per-trade statistics.
    Simulate {
        /// Probability of a winning trade.
        #[arg(long)]
        win_rate: f64,

        /// Average winning trade, percent.
        #[arg(long)]
        avg_win: f64,

        /// Average losing trade, percent (negative).
        #[arg(long, allow_hyphen_values = true)]
        avg_loss: f64,

        /// Expected trades over the horizon.
        #[arg(long, default_value_t = 50.0)]
        trades: f64,

        /// Fraction of optimal Kelly to bet.
        #[arg(long, default_value_t = 0.25)]
        kelly_fraction: f64,

        /// Override the configured number of paths.
        #[arg(long)]
        simulations: Option<usize>,

        /// Override the configured master seed.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Fractional Kelly position size for a return sample.
    Size {
        /// Returns file: JSON array or one-column CSV of fractional returns.
        #[arg(long)]
        returns: PathBuf,

        #[arg(long, default_value = "pattern")]
        pattern: String,

        #[arg(long, value_enum, default_value_t = TierArg::Primary)]
        tier: TierArg,

        /// Current volatility-index reading; overrides the config.
        #[arg(long)]
        vix: Option<f64>,
    },
    /// Full pipeline over a JSON array of patterns.
    Analyze {
        /// Patterns JSON: `[{"name", "returns", "setup_tier"?, "fire_indices"?}]`.
        #[arg(long)]
        patterns: PathBuf,

        /// Shared prices CSV for walk-forward validation.
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Current volatility-index reading; overrides the config.
        #[arg(long)]
        vix: Option<f64>,
    },
    /// Evaluate realized returns of one pattern against the risk limits.
    Risk {
        #[arg(long)]
        pattern: String,

        /// Kelly fraction the pattern was approved at.
        #[arg(long)]
        base_kelly: f64,

        /// Expected annualized Sharpe.
        #[arg(long, allow_hyphen_values = true)]
        expected_sharpe: f64,

        /// Expected mean daily return.
        #[arg(long, allow_hyphen_values = true)]
        expected_return: f64,

        /// Realized daily returns file: JSON array or one-column CSV.
        #[arg(long)]
        returns: PathBuf,
    },
    /// Print the default configuration as TOML.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Primary,
    Secondary,
}

impl From<TierArg> for SetupTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Primary => SetupTier::Primary,
            TierArg::Secondary => SetupTier::Secondary,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Stats { returns, pattern } => run_stats(&config, &returns, &pattern),
        Commands::WalkForward { prices, fires } => {
            run_walk_forward(&config, &prices, fires.as_deref())
        }
        Commands::Simulate {
            win_rate,
            avg_win,
            avg_loss,
            trades,
            kelly_fraction,
            simulations,
            seed,
        } => {
            let stats = TradingStats {
                win_rate,
                avg_win,
                avg_loss,
                num_trades: trades,
                kelly_fraction,
            };
            run_simulate(config, &stats, simulations, seed)
        }
        Commands::Size {
            returns,
            pattern,
            tier,
            vix,
        } => run_size(with_vix(config, vix), &returns, &pattern, tier.into()),
        Commands::Analyze { patterns, prices, vix } => {
            run_analyze(&with_vix(config, vix), &patterns, prices.as_deref())
        }
        Commands::Risk {
            pattern,
            base_kelly,
            expected_sharpe,
            expected_return,
            returns,
        } => {
            let expected = ExpectedPerformance {
                sharpe: expected_sharpe,
                mean_return: expected_return,
            };
            run_risk(&config, &pattern, base_kelly, expected, &returns)
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("edgelab=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => {
            AnalysisConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(AnalysisConfig::default()),
    }
}

fn with_vix(mut config: AnalysisConfig, vix: Option<f64>) -> AnalysisConfig {
    if vix.is_some() {
        config.volatility_index = vix;
    }
    config
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ─── Commands ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatsOutput {
    pattern: String,
    fingerprint: SampleFingerprint,
    robust_score: f64,
    stats: RobustStatistics,
}

fn run_stats(config: &AnalysisConfig, returns_path: &Path, pattern: &str) -> Result<()> {
    let returns = input::read_returns(returns_path)?;
    let stats = calculate_robust_stats(&returns, &config.robust);
    tracing::info!(
        pattern,
        n = stats.sample_size,
        confidence = stats.confidence_score,
        "computed robust stats"
    );
    print_json(&StatsOutput {
        pattern: pattern.to_string(),
        fingerprint: SampleFingerprint::of(pattern, &returns),
        robust_score: robust_score(&stats, &config.score_weights),
        stats,
    })
}

fn run_walk_forward(
    config: &AnalysisConfig,
    prices_path: &Path,
    fires: Option<&Path>,
) -> Result<()> {
    let series = input::read_prices(prices_path)?;
    let validator = WalkForwardValidator::new(config.walk_forward.clone());
    let validation = match fires {
        Some(path) => {
            let indices = input::read_fire_indices(path)?;
            let signals = signals_from_indices(series.len(), &indices, config.hold_days);
            validator.validate_with_signals(&series.closes, &signals)
        }
        None => validator.validate(&series.closes),
    };
    tracing::info!(
        from = ?series.date_at(0),
        to = ?series.len().checked_sub(1).and_then(|last| series.date_at(last)),
        windows = validation.total_windows,
        quality = ?validation.strategy_quality,
        "walk-forward validation complete"
    );
    print_json(&validation)
}

#[derive(Serialize)]
struct SimulateOutput {
    summary: SimulationSummary,
    kelly_adjustment: KellyAdjustment,
}

fn run_simulate(
    mut config: AnalysisConfig,
    stats: &TradingStats,
    simulations: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    if let Some(n) = simulations {
        config.monte_carlo.num_simulations = n;
    }
    if seed.is_some() {
        config.monte_carlo.seed = seed;
    }
    let result = MonteCarloSimulator::new(config.monte_carlo).run(stats)?;
    let kelly_adjustment = recommend_kelly_adjustment(&result.summary, stats.kelly_fraction);
    tracing::info!(
        seed = result.summary.seed,
        prob_ruin = result.summary.prob_ruin,
        "simulation complete"
    );
    print_json(&SimulateOutput {
        summary: result.summary,
        kelly_adjustment,
    })
}

fn run_size(
    config: AnalysisConfig,
    returns_path: &Path,
    pattern: &str,
    tier: SetupTier,
) -> Result<()> {
    let returns = input::read_returns(returns_path)?;
    let stats = calculate_robust_stats(&returns, &config.robust);
    let sizer = PositionSizer::new(config.sizing.clone());
    let size = sizer.from_robust_stats(pattern, &stats, tier, config.market_regime());
    tracing::info!(
        pattern,
        recommendation = ?size.recommendation,
        regime = %size.regime,
        size = size.recommended_size,
        "sized position"
    );
    print_json(&size)
}

fn run_analyze(
    config: &AnalysisConfig,
    patterns_path: &Path,
    prices_path: Option<&Path>,
) -> Result<()> {
    let series = prices_path.map(input::read_prices).transpose()?;
    let inputs = input::read_patterns(patterns_path, series.as_ref(), config.hold_days)?;
    let reports = analyze_family(&inputs, config)?;
    let actionable = reports.iter().filter(|r| r.is_actionable()).count();
    tracing::info!(
        patterns = reports.len(),
        actionable,
        regime = %config.market_regime(),
        "analysis complete"
    );
    print_json(&reports)
}

fn run_risk(
    config: &AnalysisConfig,
    pattern: &str,
    base_kelly: f64,
    expected: ExpectedPerformance,
    returns_path: &Path,
) -> Result<()> {
    let returns = input::read_returns(returns_path)?;
    let mut controller = DynamicRiskController::new(config.risk.clone());
    controller.register(pattern, base_kelly, expected);
    let status = controller.update(pattern, &returns)?;
    print_json(status)
}
