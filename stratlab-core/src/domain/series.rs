//! PriceSeries: a validated, chronologically ordered run of daily bars.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use super::bar::Bar;

/// Data-validation failures. The pipeline never runs on a series that
/// produced one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("price series for '{symbol}' is empty")]
    Empty { symbol: String },

    #[error("bar {index} dated {date} does not follow previous bar dated {prev}")]
    NonMonotonic {
        index: usize,
        prev: NaiveDate,
        date: NaiveDate,
    },

    #[error("bar dated {date} has invalid {field} price: {value}")]
    InvalidPrice {
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },

    #[error("{what} has {actual} entries but the price series has {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// An immutable daily price series for one symbol.
///
/// Invariants (checked by `new`): at least one bar, strictly increasing dates
/// (so no duplicates), every OHLC price positive and finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        if bars.is_empty() {
            return Err(SeriesError::Empty { symbol });
        }

        for (i, bar) in bars.iter().enumerate() {
            if let Some((field, value)) = bar.invalid_price() {
                return Err(SeriesError::InvalidPrice {
                    date: bar.date,
                    field,
                    value,
                });
            }
            if i > 0 && bar.date <= bars[i - 1].date {
                return Err(SeriesError::NonMonotonic {
                    index: i,
                    prev: bars[i - 1].date,
                    date: bar.date,
                });
            }
        }

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// Position of the bar dated `date`, if present.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
