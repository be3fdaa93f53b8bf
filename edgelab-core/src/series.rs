//! Daily price series handed over by the data collaborator, plus signal helpers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ascending daily closes. Gaps between trading days are not modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("length mismatch: {dates} dates vs {closes} closes")]
    LengthMismatch { dates: usize, closes: usize },
    #[error("dates not strictly ascending at index {index} ({date})")]
    NotAscending { index: usize, date: NaiveDate },
    #[error("invalid close {value} at index {index}")]
    InvalidClose { index: usize, value: f64 },
}

impl PriceSeries {
    /// Build a validated series: equal lengths, strictly ascending dates,
    /// finite positive closes.
    pub fn new(dates: Vec<NaiveDate>, closes: Vec<f64>) -> Result<Self, SeriesError> {
        if dates.len() != closes.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                closes: closes.len(),
            });
        }
        if let Some(i) = dates.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SeriesError::NotAscending {
                index: i + 1,
                date: dates[i + 1],
            });
        }
        if let Some((index, &value)) = closes
            .iter()
            .enumerate()
            .find(|(_, c)| !c.is_finite() || **c <= 0.0)
        {
            return Err(SeriesError::InvalidClose { index, value });
        }
        Ok(Self { dates, closes })
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Date at a bar index, if in range.
    pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
        self.dates.get(index).copied()
    }
}

/// Convert pattern-fire indices into a 0/1 position array of length `len`.
///
/// A position is held for `hold_days` bars starting at each fire bar.
/// Overlapping holds merge; indices past the end are ignored.
pub fn signals_from_indices(len: usize, indices: &[usize], hold_days: usize) -> Vec<f64> {
    let mut signals = vec![0.0; len];
    let hold = hold_days.max(1);
    for &start in indices {
        if start >= len {
            continue;
        }
        let end = (start + hold).min(len);
        for s in &mut signals[start..end] {
            *s = 1.0;
        }
    }
    signals
}
