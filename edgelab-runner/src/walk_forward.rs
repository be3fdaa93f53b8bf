//! Walk-forward validation — rolling train/test windows and OOS degradation.
//!
//! Slides a fixed-size window over a price series: each window is a training
//! (in-sample, IS) slice immediately followed by a testing (out-of-sample,
//! OOS) slice. Per-step returns are built once over the whole series and each
//! half takes the returns realized on its own bars, so the move into
//! `test_start` belongs to the OOS half. Return and Sharpe are computed on
//! each half independently, then aggregated into a quality classification.
//!
//! The degradation ratio is OOS / IS. It is only meaningful when the IS
//! return is positive, so windows with IS <= 0 are excluded from its average.
//! With no such window the average is defined as 0.

use serde::{Deserialize, Serialize};

use edgelab_core::metrics::{annualized_sharpe, compounded_return_pct, mean, simple_returns};

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Bars per in-sample slice (default 252 = 1 year).
    pub train_days: usize,
    /// Bars per out-of-sample slice (default 63 = 1 quarter).
    pub test_days: usize,
    /// Bars the window start advances each step (default 21 = 1 month).
    pub step_days: usize,
    /// Average degradation below this flags overfitting.
    pub degradation_threshold: f64,
    /// Compare per-bar rather than whole-slice returns, for train and test
    /// slices of different lengths.
    pub normalize_by_length: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_days: 252,
            test_days: 63,
            step_days: 21,
            degradation_threshold: 0.5,
            normalize_by_length: false,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Bar index ranges of one window. Ranges are half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

/// One evaluated window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OosWindow {
    pub window_index: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
    /// Compounded in-sample return, percent.
    pub is_return: f64,
    /// Compounded out-of-sample return, percent.
    pub oos_return: f64,
    pub is_sharpe: f64,
    pub oos_sharpe: f64,
    /// OOS / IS return, present only when the IS return is positive.
    pub degradation_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyQuality {
    Excellent,
    Acceptable,
    Warning,
    InsufficientData,
}

impl StrategyQuality {
    pub fn is_tradable(self) -> bool {
        matches!(self, StrategyQuality::Excellent | StrategyQuality::Acceptable)
    }
}

/// Aggregate of all windows. Recomputed on every call, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OosValidation {
    pub windows: Vec<OosWindow>,
    pub total_windows: usize,
    pub avg_is_return: f64,
    pub avg_oos_return: f64,
    pub avg_is_sharpe: f64,
    pub avg_oos_sharpe: f64,
    /// Mean OOS/IS ratio over windows with positive IS return; 0 when none.
    pub avg_degradation_ratio: f64,
    /// Percentage of windows with a positive OOS return.
    pub oos_consistency: f64,
    pub overfitting_detected: bool,
    pub strategy_quality: StrategyQuality,
    pub tradable: bool,
}

impl OosValidation {
    pub fn insufficient_data() -> Self {
        Self {
            windows: Vec::new(),
            total_windows: 0,
            avg_is_return: 0.0,
            avg_oos_return: 0.0,
            avg_is_sharpe: 0.0,
            avg_oos_sharpe: 0.0,
            avg_degradation_ratio: 0.0,
            oos_consistency: 0.0,
            overfitting_detected: false,
            strategy_quality: StrategyQuality::InsufficientData,
            tradable: false,
        }
    }
}

// ─── Window creation ─────────────────────────────────────────────────

/// Carve rolling windows over `total_bars` bars.
///
/// Starts at bar 0 and advances by `step_days` (at least 1) until the next
/// window would run past the data. Empty when `total_bars < train + test`.
pub fn create_windows(total_bars: usize, config: &WalkForwardConfig) -> Vec<WindowSpec> {
    let span = config.train_days + config.test_days;
    if config.train_days == 0 || config.test_days == 0 || total_bars < span {
        return Vec::new();
    }

    let step = config.step_days.max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start + span <= total_bars {
        let train_end = start + config.train_days;
        windows.push(WindowSpec {
            train_start: start,
            train_end,
            test_start: train_end,
            test_end: train_end + config.test_days,
        });
        start += step;
    }
    windows
}

/// Per-step returns of the whole series, optionally gated by a position
/// signal. Entry `k` is the return realized at bar `k + 1`.
///
/// With signals, the return realized at bar `i` is `signal[i-1] × r_i`:
/// a position taken at the close of `i-1` earns the move into `i`. Missing
/// signal entries count as flat.
fn step_returns(prices: &[f64], signals: Option<&[f64]>) -> Vec<f64> {
    let raw = simple_returns(prices);
    match signals {
        None => raw,
        Some(sig) => raw
            .iter()
            .enumerate()
            .map(|(k, r)| sig.get(k).copied().unwrap_or(0.0) * r)
            .collect(),
    }
}

/// The part of `steps` realized on the bars of `[start, end)`. The move
/// into `start` itself is included only with `include_entry`.
fn realized_between(steps: &[f64], start: usize, end: usize, include_entry: bool) -> &[f64] {
    let first = if include_entry { start.saturating_sub(1) } else { start };
    let last = end.saturating_sub(1).min(steps.len());
    &steps[first.min(last)..last]
}

// ─── Validator ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct WalkForwardValidator {
    config: WalkForwardConfig,
}

impl WalkForwardValidator {
    pub fn new(config: WalkForwardConfig) -> Self {
        Self { config }
    }

    /// Validate buy-and-hold returns of the price series.
    pub fn validate(&self, prices: &[f64]) -> OosValidation {
        self.run(prices, None)
    }

    /// Validate a strategy whose position at each bar is given by `signals`
    /// (aligned with `prices`, one step behind the returns it earns).
    pub fn validate_with_signals(&self, prices: &[f64], signals: &[f64]) -> OosValidation {
        self.run(prices, Some(signals))
    }

    fn run(&self, prices: &[f64], signals: Option<&[f64]>) -> OosValidation {
        let specs = create_windows(prices.len(), &self.config);
        if specs.is_empty() {
            tracing::debug!(
                bars = prices.len(),
                required = self.config.train_days + self.config.test_days,
                "walk-forward: insufficient data"
            );
            return OosValidation::insufficient_data();
        }

        let steps = step_returns(prices, signals);
        let windows: Vec<OosWindow> = specs
            .iter()
            .enumerate()
            .map(|(window_index, spec)| {
                // IS spans its own closes; OOS also earns the move into test_start
                let is_rets = realized_between(&steps, spec.train_start, spec.train_end, false);
                let oos_rets = realized_between(&steps, spec.test_start, spec.test_end, true);
                let is_return = compounded_return_pct(is_rets);
                let oos_return = compounded_return_pct(oos_rets);
                let degradation = if self.config.normalize_by_length {
                    degradation_ratio(
                        is_return / is_rets.len().max(1) as f64,
                        oos_return / oos_rets.len().max(1) as f64,
                    )
                } else {
                    degradation_ratio(is_return, oos_return)
                };
                OosWindow {
                    window_index,
                    train_start: spec.train_start,
                    train_end: spec.train_end,
                    test_start: spec.test_start,
                    test_end: spec.test_end,
                    is_return,
                    oos_return,
                    is_sharpe: annualized_sharpe(is_rets),
                    oos_sharpe: annualized_sharpe(oos_rets),
                    degradation_ratio: degradation,
                }
            })
            .collect();

        let validation = aggregate(windows, self.config.degradation_threshold);
        tracing::debug!(
            windows = validation.total_windows,
            degradation = validation.avg_degradation_ratio,
            consistency = validation.oos_consistency,
            quality = ?validation.strategy_quality,
            "walk-forward complete"
        );
        validation
    }
}

/// OOS return relative to IS return. `None` unless IS > 0.
pub fn degradation_ratio(is_return: f64, oos_return: f64) -> Option<f64> {
    if is_return > 0.0 {
        Some(oos_return / is_return)
    } else {
        None
    }
}

/// Aggregate evaluated windows into a classification.
pub fn aggregate(windows: Vec<OosWindow>, degradation_threshold: f64) -> OosValidation {
    if windows.is_empty() {
        return OosValidation::insufficient_data();
    }

    let n = windows.len();
    let pick = |f: fn(&OosWindow) -> f64| windows.iter().map(f).collect::<Vec<f64>>();
    let avg_is_return = mean(&pick(|w| w.is_return));
    let avg_oos_return = mean(&pick(|w| w.oos_return));
    let avg_is_sharpe = mean(&pick(|w| w.is_sharpe));
    let avg_oos_sharpe = mean(&pick(|w| w.oos_sharpe));

    let ratios: Vec<f64> = windows.iter().filter_map(|w| w.degradation_ratio).collect();
    let avg_degradation_ratio = if ratios.is_empty() { 0.0 } else { mean(&ratios) };

    let positive_oos = windows.iter().filter(|w| w.oos_return > 0.0).count();
    let oos_consistency = positive_oos as f64 / n as f64 * 100.0;

    let strategy_quality = classify(avg_degradation_ratio, oos_consistency);

    OosValidation {
        total_windows: n,
        windows,
        avg_is_return,
        avg_oos_return,
        avg_is_sharpe,
        avg_oos_sharpe,
        avg_degradation_ratio,
        oos_consistency,
        overfitting_detected: avg_degradation_ratio < degradation_threshold,
        strategy_quality,
        tradable: strategy_quality.is_tradable(),
    }
}

/// EXCELLENT: degradation >= 0.8 and consistency >= 70.
/// ACCEPTABLE: degradation >= 0.5 and consistency >= 50.
fn classify(avg_degradation_ratio: f64, oos_consistency: f64) -> StrategyQuality {
    if avg_degradation_ratio >= 0.8 && oos_consistency >= 70.0 {
        StrategyQuality::Excellent
    } else if avg_degradation_ratio >= 0.5 && oos_consistency >= 50.0 {
        StrategyQuality::Acceptable
    } else {
        StrategyQuality::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(train: usize, test: usize, step: usize) -> WalkForwardConfig {
        WalkForwardConfig {
            train_days: train,
            test_days: test,
            step_days: step,
            ..Default::default()
        }
    }

    fn geometric(n: usize, growth: f64) -> Vec<f64> {
        (0..n).map(|i| 100.0 * growth.powi(i as i32)).collect()
    }

    fn window(is_return: f64, oos_return: f64) -> OosWindow {
        OosWindow {
            window_index: 0,
            train_start: 0,
            train_end: 10,
            test_start: 10,
            test_end: 15,
            is_return,
            oos_return,
            is_sharpe: 0.0,
            oos_sharpe: 0.0,
            degradation_ratio: degradation_ratio(is_return, oos_return),
        }
    }

    // ─── Window creation ─────────────────────────────────────────

    #[test]
    fn windows_are_adjacent_and_step_forward() {
        let w = create_windows(100, &config(40, 20, 10));
        // Starts 0, 10, 20, 30, 40 (40 + 60 = 100)
        assert_eq!(w.len(), 5);
        for spec in &w {
            assert_eq!(spec.test_start, spec.train_end);
            assert_eq!(spec.test_end - spec.test_start, 20);
            assert!(spec.test_end <= 100);
        }
        assert_eq!(w[1].train_start, 10);
        assert_eq!(w[4].test_end, 100);
    }

    #[test]
    fn exact_fit_gives_one_window() {
        assert_eq!(create_windows(60, &config(40, 20, 10)).len(), 1);
        assert!(create_windows(59, &config(40, 20, 10)).is_empty());
    }

    #[test]
    fn zero_step_still_advances() {
        assert_eq!(create_windows(62, &config(40, 20, 0)).len(), 3);
    }

    // ─── Validation ──────────────────────────────────────────────

    #[test]
    fn short_history_is_insufficient() {
        let v = WalkForwardValidator::new(config(252, 63, 21)).validate(&geometric(300, 1.001));
        assert_eq!(v.total_windows, 0);
        assert_eq!(v.strategy_quality, StrategyQuality::InsufficientData);
        assert!(!v.tradable);
    }

    #[test]
    fn empty_prices_are_insufficient() {
        let v = WalkForwardValidator::default().validate(&[]);
        assert_eq!(v.strategy_quality, StrategyQuality::InsufficientData);
    }

    #[test]
    fn steady_uptrend_is_excellent() {
        let v = WalkForwardValidator::new(config(60, 60, 20)).validate(&geometric(400, 1.001));
        assert!(v.total_windows > 0);
        for w in &v.windows {
            assert!(w.is_return > 0.0);
            assert!(w.oos_return > 0.0);
            let ratio = w.degradation_ratio.unwrap();
            assert!((0.95..1.05).contains(&ratio), "ratio {ratio}");
        }
        assert_eq!(v.oos_consistency, 100.0);
        assert_eq!(v.strategy_quality, StrategyQuality::Excellent);
        assert!(v.tradable);
        assert!(!v.overfitting_detected);
    }

    #[test]
    fn shorter_test_slice_degrades_plain_ratio() {
        // 99 IS steps of +0.1% against 50 OOS steps
        let v = WalkForwardValidator::new(config(100, 50, 50)).validate(&geometric(150, 1.001));
        assert_eq!(v.total_windows, 1);
        let w = &v.windows[0];
        assert!((w.is_return - (1.001_f64.powi(99) - 1.0) * 100.0).abs() < 1e-9);
        assert!((w.oos_return - (1.001_f64.powi(50) - 1.0) * 100.0).abs() < 1e-9);
        let ratio = w.degradation_ratio.unwrap();
        assert!((ratio - w.oos_return / w.is_return).abs() < 1e-12);
        assert!(ratio < 0.5);
        assert!(v.overfitting_detected);
        assert_eq!(v.strategy_quality, StrategyQuality::Warning);
    }

    #[test]
    fn default_windows_need_length_normalization() {
        let prices = geometric(504, 1.0005);
        let plain = WalkForwardValidator::default().validate(&prices);
        assert_eq!(plain.total_windows, 10);
        assert!(plain.avg_degradation_ratio < 0.3);
        assert_eq!(plain.strategy_quality, StrategyQuality::Warning);

        let per_bar = WalkForwardConfig {
            normalize_by_length: true,
            ..Default::default()
        };
        let v = WalkForwardValidator::new(per_bar).validate(&prices);
        assert!(v.avg_degradation_ratio > 0.8 && v.avg_degradation_ratio <= 1.0);
        assert_eq!(v.strategy_quality, StrategyQuality::Excellent);
        assert!(v.tradable);
    }

    #[test]
    fn degradation_is_plain_ratio() {
        assert_eq!(degradation_ratio(10.0, 5.0), Some(0.5));
        assert_eq!(degradation_ratio(4.0, -2.0), Some(-0.5));
        assert_eq!(degradation_ratio(0.0, 5.0), None);
        assert_eq!(degradation_ratio(-1.0, 5.0), None);
        assert_eq!(degradation_ratio(f64::NAN, 5.0), None);
    }

    #[test]
    fn steady_downtrend_has_zero_degradation() {
        let v = WalkForwardValidator::new(config(60, 30, 15)).validate(&geometric(300, 0.999));
        assert!(v.total_windows > 0);
        assert!(v.windows.iter().all(|w| w.is_return < 0.0));
        assert!(v.windows.iter().all(|w| w.degradation_ratio.is_none()));
        assert_eq!(v.avg_degradation_ratio, 0.0);
        assert!(v.overfitting_detected);
        assert_eq!(v.strategy_quality, StrategyQuality::Warning);
        assert!(!v.tradable);
    }

    #[test]
    fn flat_signals_earn_nothing() {
        let prices = geometric(200, 1.002);
        let v = WalkForwardValidator::new(config(50, 50, 25))
            .validate_with_signals(&prices, &[0.0; 200]);
        assert!(v.windows.iter().all(|w| w.is_return == 0.0 && w.oos_return == 0.0));
        assert_eq!(v.oos_consistency, 0.0);
    }

    #[test]
    fn signals_are_one_step_behind_returns() {
        // Only the move from bar 2 to bar 3 (+10%) is captured: signal set at bar 2
        let prices = [100.0, 100.0, 100.0, 110.0, 110.0, 110.0];
        let mut signals = [0.0; 6];
        signals[2] = 1.0;
        let rets = step_returns(&prices, Some(&signals));
        assert_eq!(rets.len(), 5);
        assert!((rets[2] - 0.10).abs() < 1e-12);
        assert!(rets.iter().enumerate().all(|(i, r)| i == 2 || *r == 0.0));
    }

    #[test]
    fn short_signal_array_counts_as_flat() {
        let prices = [100.0, 110.0, 121.0];
        let rets = step_returns(&prices, Some(&[1.0]));
        assert!((rets[0] - 0.10).abs() < 1e-12);
        assert_eq!(rets[1], 0.0);
    }

    #[test]
    fn jump_at_test_start_belongs_to_oos() {
        let mut prices = vec![100.0; 10];
        prices.extend([110.0; 5]);
        let v = WalkForwardValidator::new(config(10, 5, 5)).validate(&prices);
        assert_eq!(v.total_windows, 1);
        assert_eq!(v.windows[0].is_return, 0.0);
        assert!((v.windows[0].oos_return - 10.0).abs() < 1e-9);
        assert_eq!(v.oos_consistency, 100.0);
    }

    #[test]
    fn single_bar_test_slice_earns_its_move() {
        let mut prices = vec![100.0; 10];
        prices.push(110.0);
        let v = WalkForwardValidator::new(config(10, 1, 1)).validate(&prices);
        assert_eq!(v.total_windows, 1);
        assert!((v.windows[0].oos_return - 10.0).abs() < 1e-9);
        assert_eq!(v.oos_consistency, 100.0);

        let rising = WalkForwardValidator::new(config(20, 1, 1)).validate(&geometric(40, 1.01));
        assert_eq!(rising.total_windows, 20);
        assert!(rising.windows.iter().all(|w| (w.oos_return - 1.0).abs() < 1e-9));
        assert_eq!(rising.oos_consistency, 100.0);
    }

    #[test]
    fn position_opened_on_last_train_bar_pays_out_of_sample() {
        let mut prices = vec![100.0; 10];
        prices.extend([110.0; 5]);
        let mut signals = vec![0.0; 15];
        signals[9] = 1.0;
        let v = WalkForwardValidator::new(config(10, 5, 5))
            .validate_with_signals(&prices, &signals);
        assert_eq!(v.windows[0].is_return, 0.0);
        assert!((v.windows[0].oos_return - 10.0).abs() < 1e-9);
    }

    #[test]
    fn halves_cover_every_step_once() {
        let prices = geometric(30, 1.02);
        let steps = step_returns(&prices, None);
        let is = realized_between(&steps, 0, 20, false);
        let oos = realized_between(&steps, 20, 30, true);
        assert_eq!(is.len() + oos.len(), steps.len());
        assert_eq!(oos.len(), 10);
    }

    // ─── Aggregation ─────────────────────────────────────────────

    #[test]
    fn degradation_ignores_non_positive_is() {
        let v = aggregate(vec![window(10.0, 5.0), window(-4.0, 8.0), window(0.0, 1.0)], 0.5);
        assert!((v.avg_degradation_ratio - 0.5).abs() < 1e-12);
        // Returns average unconditionally
        assert!((v.avg_is_return - 2.0).abs() < 1e-12);
        assert!((v.oos_consistency - 100.0).abs() < 1e-12);
        assert_eq!(v.strategy_quality, StrategyQuality::Acceptable);
        assert!(!v.overfitting_detected);
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(classify(0.8, 70.0), StrategyQuality::Excellent);
        assert_eq!(classify(0.79, 90.0), StrategyQuality::Acceptable);
        assert_eq!(classify(0.9, 69.0), StrategyQuality::Acceptable);
        assert_eq!(classify(0.5, 50.0), StrategyQuality::Acceptable);
        assert_eq!(classify(0.49, 100.0), StrategyQuality::Warning);
        assert_eq!(classify(1.0, 49.0), StrategyQuality::Warning);
    }

    #[test]
    fn aggregate_is_repeatable() {
        let ws = vec![window(3.0, 2.0), window(5.0, -1.0)];
        assert_eq!(aggregate(ws.clone(), 0.5), aggregate(ws, 0.5));
    }

    #[test]
    fn quality_serializes_screaming() {
        let json = serde_json::to_string(&StrategyQuality::InsufficientData).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_DATA\"");
    }
}
