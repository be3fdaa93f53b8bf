//! Input file readers: return samples, price series, pattern lists.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use edgelab_core::regime::SetupTier;
use edgelab_core::series::{signals_from_indices, PriceSeries};
use edgelab_runner::PatternInput;

/// Read a return sample: a JSON array of numbers, or a one-column CSV
/// (an optional non-numeric header row is skipped).
pub fn read_returns(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read returns from {}", path.display()))?;

    if is_json(path, &text) {
        return serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON array of numbers", path.display()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut returns = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed CSV row {}", row + 1))?;
        let Some(field) = record.get(0).filter(|f| !f.is_empty()) else {
            continue;
        };
        match field.parse::<f64>() {
            Ok(value) => returns.push(value),
            Err(_) if row == 0 => continue,
            Err(_) => bail!("row {}: '{}' is not a number", row + 1, field),
        }
    }
    Ok(returns)
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    close: f64,
}

/// Read a `date,close` CSV into a validated price series.
pub fn read_prices(path: &Path) -> Result<PriceSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open prices {}", path.display()))?;

    let mut dates = Vec::new();
    let mut closes = Vec::new();
    for (row, record) in reader.deserialize::<PriceRow>().enumerate() {
        let record = record.with_context(|| format!("malformed price row {}", row + 2))?;
        dates.push(record.date);
        closes.push(record.close);
    }

    PriceSeries::new(dates, closes)
        .with_context(|| format!("invalid price series in {}", path.display()))
}

/// Read a JSON array of bar indices at which a pattern fired.
pub fn read_fire_indices(path: &Path) -> Result<Vec<usize>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fire indices from {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of bar indices", path.display()))
}

/// One entry of a pattern-family file.
#[derive(Debug, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    #[serde(default)]
    pub setup_tier: SetupTier,
    pub returns: Vec<f64>,
    /// Bars of the shared price series at which the pattern fired.
    #[serde(default)]
    pub fire_indices: Option<Vec<usize>>,
}

/// Read a JSON array of pattern specs and attach the shared price series.
///
/// Patterns with fire indices are validated in signal mode, holding each
/// fire for `hold_days` bars; the rest are validated buy-and-hold.
pub fn read_patterns(
    path: &Path,
    prices: Option<&PriceSeries>,
    hold_days: usize,
) -> Result<Vec<PatternInput>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read patterns from {}", path.display()))?;
    let specs: Vec<PatternSpec> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of patterns", path.display()))?;

    Ok(specs
        .into_iter()
        .map(|spec| {
            let signals = match (prices, &spec.fire_indices) {
                (Some(series), Some(fires)) => {
                    Some(signals_from_indices(series.len(), fires, hold_days))
                }
                _ => None,
            };
            PatternInput {
                name: spec.name,
                setup_tier: spec.setup_tier,
                returns: spec.returns,
                prices: prices.map(|series| series.closes.clone()),
                signals,
            }
        })
        .collect())
}

fn is_json(path: &Path, text: &str) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        || text.trim_start().starts_with('[')
}
