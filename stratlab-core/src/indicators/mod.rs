//! Indicator library: pure functions from bars to derived series.
//!
//! Every indicator returns a `Vec<f64>` with one value per bar. Bars without
//! enough history hold `f64::NAN`; strategies treat any comparison against an
//! undefined value as "no signal".
//!
//! Indicators are computed once per run into an `IndicatorValues` annotation,
//! a new value alongside the price series. The series itself is never mutated.

pub mod atr;
pub mod extrema;
pub mod rsi;
pub mod sma;
pub mod supertrend;

pub use atr::{ema, true_range, Atr, AtrSmoothing};
pub use extrema::{rolling_max, rolling_min, Extreme, RollingExtreme};
pub use rsi::Rsi;
pub use sma::{rolling_mean, Sma};
pub use supertrend::{Supertrend, SupertrendBands};

use crate::domain::Bar;
use std::collections::HashMap;

/// Trait for single-series indicators.
///
/// # Look-ahead guard
/// No value at bar t may depend on bars after t. Computing on a truncated
/// series must reproduce the same prefix as computing on the full series.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Index of the first bar that can hold a defined value.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole series. Output length equals `bars.len()`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Named indicator series produced for one price series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    /// Compute `indicator` over `bars` and store it under the indicator's name.
    pub fn compute(&mut self, indicator: &dyn Indicator, bars: &[Bar]) -> String {
        let name = indicator.name().to_string();
        self.series.insert(name.clone(), indicator.compute(bars));
        name
    }

    /// Value at `bar_index`, or `None` if the series or index is missing.
    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    /// Value at `bar_index` only if it is defined (not NaN).
    pub fn defined(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.get(name, bar_index).filter(|v| !v.is_nan())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Series names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.series.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base_date + chrono::Duration::days(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
            )
        })
        .collect()
}

/// Bars from explicit (open, high, low, close) tuples, one day apart.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Bar::new(
                base_date + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_values_insert_and_get() {
        let mut iv = IndicatorValues::new();
        iv.insert("sma_3", vec![f64::NAN, f64::NAN, 100.0, 101.0]);
        assert!(iv.get("sma_3", 0).unwrap().is_nan());
        assert_eq!(iv.defined("sma_3", 0), None);
        assert_eq!(iv.get("sma_3", 2), Some(100.0));
        assert_eq!(iv.defined("sma_3", 3), Some(101.0));
        assert_eq!(iv.get("sma_3", 4), None);
    }

    #[test]
    fn indicator_values_missing_name() {
        let iv = IndicatorValues::new();
        assert_eq!(iv.get("nonexistent", 0), None);
        assert!(iv.is_empty());
    }

    #[test]
    fn compute_stores_under_indicator_name() {
        let bars = make_bars(&[1.0, 2.0, 3.0]);
        let mut iv = IndicatorValues::new();
        let key = iv.compute(&Sma::new(2), &bars);
        assert_eq!(key, "sma_2");
        assert_eq!(iv.get("sma_2", 2), Some(2.5));
        assert_eq!(iv.names(), vec!["sma_2"]);
        assert_eq!(iv.len(), 1);
    }

    /// Look-ahead guard: computing on a prefix reproduces the same prefix.
    #[test]
    fn indicators_have_no_lookahead() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 8.0 + i as f64 * 0.1)
            .collect();
        let bars = make_bars(&closes);
        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(Atr::new(14, AtrSmoothing::Exponential)),
            Box::new(Atr::new(14, AtrSmoothing::Simple)),
            Box::new(Sma::new(10)),
            Box::new(Rsi::new(14)),
            Box::new(RollingExtreme::high(20)),
            Box::new(RollingExtreme::low(20)),
            Box::new(Supertrend::new(10, 3.0)),
        ];
        for ind in &indicators {
            let full = ind.compute(&bars);
            let truncated = ind.compute(&bars[..40]);
            for i in 0..40 {
                let (a, b) = (full[i], truncated[i]);
                assert!(
                    (a.is_nan() && b.is_nan()) || a == b,
                    "{} differs at bar {i}: full={a}, truncated={b}",
                    ind.name()
                );
            }
        }
    }

    #[test]
    fn lookback_prefix_is_undefined() {
        let bars = make_bars(&(0..40).map(|i| 50.0 + i as f64).collect::<Vec<_>>());
        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(Atr::new(5, AtrSmoothing::Exponential)),
            Box::new(Atr::new(5, AtrSmoothing::Simple)),
            Box::new(Sma::new(5)),
            Box::new(Rsi::new(5)),
            Box::new(RollingExtreme::high(5)),
            Box::new(Supertrend::new(5, 2.0)),
        ];
        for ind in &indicators {
            let values = ind.compute(&bars);
            assert_eq!(values.len(), bars.len());
            for (i, v) in values.iter().enumerate().take(ind.lookback()) {
                assert!(v.is_nan(), "{} defined at warmup bar {i}", ind.name());
            }
            assert!(
                !values[ind.lookback()].is_nan(),
                "{} undefined at its lookback bar",
                ind.name()
            );
        }
    }
}
