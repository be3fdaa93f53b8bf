//! Significance testing for trade-return samples.
//!
//! A one-tailed t-test (H0: mean = 0, H1: mean > 0) backed by a Student-t
//! CDF, and Benjamini-Hochberg correction across a family of screened
//! patterns.
//!
//! The one-tailed test only looks for a positive edge. A negative or zero
//! t-statistic is reported with p = 1.0, which discards evidence of a
//! significantly *negative* edge.

use serde::{Deserialize, Serialize};

use crate::metrics::{mean, std_dev, STD_EPSILON};

/// Conventional significance level for a single pattern.
pub const DEFAULT_ALPHA: f64 = 0.05;

// ─── Student-t distribution ──────────────────────────────────────────

const LANCZOS_G: f64 = 7.0;

#[allow(clippy::excessive_precision)]
const LANCZOS: [f64; 9] = [
    0.99999999999980993,
    676.5203681218851,
    -1259.1392167224028,
    771.32342877765313,
    -176.61502916214059,
    12.507343278686905,
    -0.13857109526572012,
    9.9843695780195716e-6,
    1.5056327351493116e-7,
];

fn ln_gamma(x: f64) -> f64 {
    use std::f64::consts::PI;

    if x < 0.5 {
        let s = (PI * x).sin().abs();
        return if s < 1e-300 {
            f64::INFINITY
        } else {
            PI.ln() - s.ln() - ln_gamma(1.0 - x)
        };
    }

    let z = x - 1.0;
    let series = LANCZOS[1..]
        .iter()
        .zip(1..)
        .fold(LANCZOS[0], |acc, (c, k)| acc + c / (z + f64::from(k)));
    let t = z + LANCZOS_G + 0.5;
    0.5 * (2.0 * PI).ln() + (z + 0.5) * t.ln() - t + series.ln()
}

/// Keeps a Lentz denominator away from zero.
fn nudge(v: f64) -> f64 {
    const TINY: f64 = 1e-30;
    if v.abs() < TINY {
        TINY
    } else {
        v
    }
}

/// I_x(a, b) by continued fraction (modified Lentz).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) {
        return f64::NAN;
    }
    if x == 0.0 || x == 1.0 {
        return x;
    }
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - incomplete_beta(b, a, 1.0 - x);
    }

    let front = (a * x.ln() + b * (1.0 - x).ln() + ln_gamma(a + b)
        - ln_gamma(a)
        - ln_gamma(b)
        - a.ln())
    .exp();

    let mut c = 1.0;
    let mut d = 1.0 / nudge(1.0 - (a + b) * x / (a + 1.0));
    let mut frac = d;
    for m in 1..=200 {
        let m = f64::from(m);
        let two_m = 2.0 * m;
        let terms = [
            m * (b - m) * x / ((a + two_m - 1.0) * (a + two_m)),
            -(a + m) * (a + b + m) * x / ((a + two_m) * (a + two_m + 1.0)),
        ];
        let mut last = 1.0;
        for term in terms {
            d = 1.0 / nudge(1.0 + term * d);
            c = nudge(1.0 + term / c);
            last = c * d;
            frac *= last;
        }
        if (last - 1.0).abs() < 1e-14 {
            break;
        }
    }
    front * frac
}

/// P(T <= t) for a Student-t variable with `df` degrees of freedom.
pub fn t_cdf(t: f64, df: f64) -> f64 {
    if df <= 0.0 {
        return f64::NAN;
    }
    let tail = 0.5 * incomplete_beta(df / 2.0, 0.5, df / (df + t * t));
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

// ─── One-tailed t-test ───────────────────────────────────────────────

/// Outcome of a one-sample, one-tailed t-test against a zero mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Significance {
    pub t_statistic: f64,
    /// One-tailed p-value, P(T > t) under H0. Exactly 1.0 when t <= 0.
    pub p_value: f64,
    /// Degrees of freedom (n - 1); 0 when the test could not run.
    pub df: f64,
    /// `p_value < alpha && t_statistic > 0`.
    pub is_significant: bool,
}

impl Significance {
    /// The result reported when the test cannot run (n < 2 or zero variance).
    pub fn neutral() -> Self {
        Self {
            t_statistic: 0.0,
            p_value: 1.0,
            df: 0.0,
            is_significant: false,
        }
    }
}

/// One-tailed t-test, H0: mean = 0 vs H1: mean > 0.
///
/// Fewer than 2 values or a zero standard deviation yield
/// [`Significance::neutral`]; no NaN is ever produced.
pub fn one_tailed_t_test(values: &[f64], alpha: f64) -> Significance {
    let n = values.len();
    if n < 2 {
        return Significance::neutral();
    }

    let n_f = n as f64;
    let std = std_dev(values);
    if std < STD_EPSILON {
        return Significance::neutral();
    }

    let t_statistic = mean(values) / (std / n_f.sqrt());
    let df = n_f - 1.0;
    let p_value = if t_statistic > 0.0 {
        // Half the two-tailed p-value
        (1.0 - t_cdf(t_statistic, df)).clamp(0.0, 1.0)
    } else {
        1.0
    };

    Significance {
        t_statistic,
        p_value,
        df,
        is_significant: p_value < alpha && t_statistic > 0.0,
    }
}

// ─── Multiple-comparison correction ──────────────────────────────────

/// Benjamini-Hochberg adjusted result for one pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FdrResult {
    pub pattern: String,
    pub raw_p: f64,
    pub adjusted_p: f64,
    pub significant: bool,
}

/// Apply Benjamini-Hochberg FDR correction to `(pattern, p_value)` pairs.
///
/// Step-up procedure: adjusted_p_(k) = min(p_(k) * m / k, adjusted_p_(k+1)),
/// clamped to 1.0. Returns results sorted by raw p-value ascending.
pub fn benjamini_hochberg(p_values: &[(String, f64)], alpha: f64) -> Vec<FdrResult> {
    if p_values.is_empty() {
        return Vec::new();
    }

    let m = p_values.len();
    let mut indexed: Vec<(&str, f64)> = p_values.iter().map(|(id, p)| (id.as_str(), *p)).collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut adjusted = vec![0.0; m];
    adjusted[m - 1] = indexed[m - 1].1.min(1.0);
    for k in (0..m - 1).rev() {
        let rank = (k + 1) as f64;
        let corrected = indexed[k].1 * m as f64 / rank;
        adjusted[k] = corrected.min(adjusted[k + 1]).min(1.0);
    }

    indexed
        .iter()
        .zip(adjusted.iter())
        .map(|(&(id, raw_p), &adjusted_p)| FdrResult {
            pattern: id.to_string(),
            raw_p,
            adjusted_p,
            significant: adjusted_p <= alpha,
        })
        .collect()
}

/// Accumulates one-tailed p-values for all patterns screened in one run.
///
/// Screening many patterns on the same instrument and date range is one
/// family: the more patterns tried, the harder each one must work to stay
/// significant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternFamily {
    entries: Vec<(String, f64)>,
}

impl PatternFamily {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pattern: impl Into<String>, p_value: f64) {
        self.entries.push((pattern.into(), p_value));
    }

    pub fn apply_correction(&self, alpha: f64) -> Vec<FdrResult> {
        benjamini_hochberg(&self.entries, alpha)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ln_gamma_known_values() {
        assert!(ln_gamma(1.0).abs() < 1e-10);
        assert!(ln_gamma(2.0).abs() < 1e-10);
        assert!((ln_gamma(3.0) - 2.0_f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn incomplete_beta_closed_forms() {
        for x in [0.1, 0.35, 0.8] {
            assert!((incomplete_beta(1.0, 1.0, x) - x).abs() < 1e-10);
            assert!((incomplete_beta(2.0, 1.0, x) - x * x).abs() < 1e-10);
        }
        assert!((incomplete_beta(3.5, 3.5, 0.5) - 0.5).abs() < 1e-10);
        assert_eq!(incomplete_beta(2.0, 3.0, 0.0), 0.0);
        assert_eq!(incomplete_beta(2.0, 3.0, 1.0), 1.0);
        assert!(incomplete_beta(2.0, 3.0, 1.5).is_nan());
    }

    #[test]
    fn t_cdf_symmetry_and_known_values() {
        for &t in &[0.5, 1.0, 2.0, 3.0] {
            assert!((t_cdf(-t, 10.0) + t_cdf(t, 10.0) - 1.0).abs() < 1e-10);
        }
        // df=1 is Cauchy: CDF(1) = 0.75
        assert!((t_cdf(1.0, 1.0) - 0.75).abs() < 1e-6);
        // Large df approaches the normal
        assert!((t_cdf(1.96, 1000.0) - 0.975).abs() < 0.005);
        assert!((t_cdf(0.0, 7.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn too_few_values_is_neutral() {
        assert_eq!(one_tailed_t_test(&[], DEFAULT_ALPHA), Significance::neutral());
        assert_eq!(one_tailed_t_test(&[0.05], DEFAULT_ALPHA), Significance::neutral());
    }

    #[test]
    fn zero_variance_is_neutral() {
        let sig = one_tailed_t_test(&[0.02, 0.02, 0.02], DEFAULT_ALPHA);
        assert_eq!(sig.p_value, 1.0);
        assert!(!sig.is_significant);
        assert!(sig.t_statistic.is_finite());
    }

    #[test]
    fn clearly_positive_mean_is_significant() {
        let sig = one_tailed_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], DEFAULT_ALPHA);
        // t = 3 / (sqrt(2.5)/sqrt(5)) = 4.2426
        assert!((sig.t_statistic - 4.242_640_687).abs() < 1e-6);
        assert!((sig.df - 4.0).abs() < 1e-12);
        assert!(sig.p_value < 0.01);
        assert!(sig.is_significant);
    }

    #[test]
    fn negative_mean_reports_p_of_one() {
        let sig = one_tailed_t_test(&[-5.0, -4.0, -3.0, -2.0, -1.0], DEFAULT_ALPHA);
        assert!(sig.t_statistic < 0.0);
        assert_eq!(sig.p_value, 1.0);
        assert!(!sig.is_significant);
    }

    #[test]
    fn symmetric_sample_reports_p_of_one() {
        let sig = one_tailed_t_test(&[-2.0, -1.0, 0.0, 1.0, 2.0], DEFAULT_ALPHA);
        assert!(sig.t_statistic.abs() < 1e-12);
        assert_eq!(sig.p_value, 1.0);
    }

    #[test]
    fn p_value_is_half_two_tailed() {
        // For df=1 and t=1: two-tailed p = 0.5, one-tailed = 0.25
        let sig = one_tailed_t_test(&[0.0, 2.0], DEFAULT_ALPHA);
        assert!((sig.t_statistic - 1.0).abs() < 1e-12);
        assert!((sig.p_value - 0.25).abs() < 1e-6);
    }

    #[test]
    fn bh_mixed_significance() {
        let pvals: Vec<(String, f64)> = vec![
            ("strong".into(), 0.001),
            ("medium".into(), 0.020),
            ("weak".into(), 0.040),
            ("noise1".into(), 0.300),
            ("noise2".into(), 0.700),
        ];
        let result = benjamini_hochberg(&pvals, 0.05);
        // Adjusted: 0.005, 0.05, 0.0667, 0.375, 0.7
        let sig: Vec<&str> = result
            .iter()
            .filter(|r| r.significant)
            .map(|r| r.pattern.as_str())
            .collect();
        assert_eq!(sig, vec!["strong", "medium"]);
    }

    #[test]
    fn bh_adjusted_p_monotonic() {
        let pvals: Vec<(String, f64)> = [0.5, 0.01, 0.1, 0.03, 0.05]
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("p{i}"), *p))
            .collect();
        let result = benjamini_hochberg(&pvals, 0.05);
        for w in result.windows(2) {
            assert!(w[1].adjusted_p >= w[0].adjusted_p - 1e-12);
        }
        assert!(benjamini_hochberg(&[], 0.05).is_empty());
    }

    #[test]
    fn family_correction_grows_with_size() {
        let mut small = PatternFamily::new();
        small.add("rally", 0.03);

        let mut large = PatternFamily::new();
        large.add("rally", 0.03);
        for i in 0..30 {
            large.add(format!("noise_{i}"), 0.6);
        }
        assert_eq!(large.len(), 31);

        let s = small.apply_correction(0.05);
        let l = large.apply_correction(0.05);
        let s_rally = s.iter().find(|r| r.pattern == "rally").unwrap();
        let l_rally = l.iter().find(|r| r.pattern == "rally").unwrap();
        assert!(s_rally.significant);
        assert!(l_rally.adjusted_p > s_rally.adjusted_p);
        assert!(!l_rally.significant);
    }
}
