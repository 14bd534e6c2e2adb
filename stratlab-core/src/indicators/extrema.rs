//! Rolling extrema: highest high / lowest low over a trailing window.
//!
//! - High: max(high[t-period+1..=t])
//! - Low:  min(low[t-period+1..=t])
//!
//! The window includes the current bar. Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

/// Which extreme of the window to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    High,
    Low,
}

#[derive(Debug, Clone)]
pub struct RollingExtreme {
    period: usize,
    kind: Extreme,
    name: String,
}

impl RollingExtreme {
    pub fn high(period: usize) -> Self {
        assert!(period >= 1, "rolling window must be >= 1");
        Self {
            period,
            kind: Extreme::High,
            name: format!("rolling_high_{period}"),
        }
    }

    pub fn low(period: usize) -> Self {
        assert!(period >= 1, "rolling window must be >= 1");
        Self {
            period,
            kind: Extreme::Low,
            name: format!("rolling_low_{period}"),
        }
    }
}

/// Trailing maximum over `period` values. NaN anywhere in the window yields NaN.
pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling_fold(values, period, f64::NEG_INFINITY, f64::max)
}

/// Trailing minimum over `period` values. NaN anywhere in the window yields NaN.
pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling_fold(values, period, f64::INFINITY, f64::min)
}

fn rolling_fold(values: &[f64], period: usize, init: f64, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().copied().fold(init, pick);
    }

    result
}

impl Indicator for RollingExtreme {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        match self.kind {
            Extreme::High => {
                let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
                rolling_max(&highs, self.period)
            }
            Extreme::Low => {
                let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
                rolling_min(&lows, self.period)
            }
        }
    }
}
