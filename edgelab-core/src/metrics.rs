//! Return-series metrics — pure functions shared by every stage.
//!
//! Every metric is a pure function: return series or capital path in, scalar
//! out. Degenerate input (empty, single observation, zero variance) yields a
//! neutral 0.0 rather than NaN.

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Standard deviations below this are treated as zero.
pub const STD_EPSILON: f64 = 1e-12;

/// Arithmetic mean. 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1). 0.0 for fewer than 2 values.
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    var.sqrt()
}

/// Simple per-step returns from a price series: `p[i] / p[i-1] - 1`.
///
/// Steps where the previous price is non-positive contribute 0.0.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Compounded return of a per-step return series, in percent.
pub fn compounded_return_pct(returns: &[f64]) -> f64 {
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    (growth - 1.0) * 100.0
}

/// Annualized Sharpe ratio: mean / std × √252, no risk-free rate.
///
/// Returns 0.0 for fewer than 2 returns or (near-)zero variance.
pub fn annualized_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < STD_EPSILON {
        return 0.0;
    }
    mean(returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum peak-to-trough decline of a capital path, as a fraction in [0, 1].
///
/// A path that reaches zero has a drawdown of exactly 1.0.
pub fn max_drawdown_fraction(path: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in path {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Maximum drawdown of a capital path, in percent.
pub fn max_drawdown_pct(path: &[f64]) -> f64 {
    max_drawdown_fraction(path) * 100.0
}

/// Capital path obtained by compounding `returns` from a starting value of 1.0.
///
/// The starting value is included, so the path has `returns.len() + 1` points.
pub fn equity_path(returns: &[f64]) -> Vec<f64> {
    let mut path = Vec::with_capacity(returns.len() + 1);
    let mut equity = 1.0_f64;
    path.push(equity);
    for r in returns {
        equity = (equity * (1.0 + r)).max(0.0);
        path.push(equity);
    }
    path
}

/// Percentile of a sorted slice using linear interpolation (`p` in 0..=100).
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Sort a copy of `values` ascending. NaNs compare as equal.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Median of an unsorted slice.
pub fn median(values: &[f64]) -> f64 {
    percentile_sorted(&sorted_copy(values), 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_basic() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((mean(&v) - 3.0).abs() < 1e-12);
        // Sample variance of 1..5 is 2.5
        assert!((std_dev(&v) - 2.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_are_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(std_dev(&[0.3]), 0.0);
        assert_eq!(annualized_sharpe(&[0.01]), 0.0);
        assert_eq!(annualized_sharpe(&[0.01, 0.01, 0.01]), 0.0);
        assert_eq!(max_drawdown_pct(&[]), 0.0);
        assert_eq!(percentile_sorted(&[], 50.0), 0.0);
    }

    #[test]
    fn simple_returns_from_prices() {
        let r = simple_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn compounded_return_in_percent() {
        let pct = compounded_return_pct(&[0.10, -0.10]);
        assert!((pct - (-1.0)).abs() < 1e-9);
        assert_eq!(compounded_return_pct(&[]), 0.0);
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        let path = [100.0, 120.0, 90.0, 130.0, 117.0];
        // Worst: 120 -> 90 = 25%
        assert!((max_drawdown_pct(&path) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_to_zero_is_total() {
        assert!((max_drawdown_fraction(&[100.0, 50.0, 0.0, 0.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn monotonic_path_has_no_drawdown() {
        assert_eq!(max_drawdown_pct(&[1.0, 2.0, 3.0, 4.0]), 0.0);
    }

    #[test]
    fn equity_path_includes_start() {
        let path = equity_path(&[0.1, -0.5]);
        assert_eq!(path.len(), 3);
        assert!((path[2] - 0.55).abs() < 1e-12);
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile_sorted(&sorted, 50.0) - 3.0).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 25.0) - 2.0).abs() < 1e-12);
        assert!((percentile_sorted(&sorted, 10.0) - 1.4).abs() < 1e-12);
        assert!((median(&[5.0, 1.0, 3.0]) - 3.0).abs() < 1e-12);
    }
}
