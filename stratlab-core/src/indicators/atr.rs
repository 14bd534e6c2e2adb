//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! Undefined at bar 0, which has no previous close.
//!
//! Two smoothings are supported:
//! - `Exponential`: EMA with alpha = 2/(period+1), no bias adjustment, seeded
//!   with the first defined True Range. Defined from bar 1.
//! - `Simple`: rolling mean of True Range. Defined from bar `period`.

use serde::{Deserialize, Serialize};

use super::sma::rolling_mean;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrSmoothing {
    #[default]
    Exponential,
    Simple,
}

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    smoothing: AtrSmoothing,
    name: String,
}

impl Atr {
    pub fn new(period: usize, smoothing: AtrSmoothing) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        let name = match smoothing {
            AtrSmoothing::Exponential => format!("atr_ema_{period}"),
            AtrSmoothing::Simple => format!("atr_sma_{period}"),
        };
        Self {
            period,
            smoothing,
            name,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// Compute the True Range series from bars. `tr[0]` is NaN.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }

    tr
}

/// Exponential moving average with alpha = 2/(period+1), `adjust=False` style.
///
/// Leading NaNs stay NaN; the first defined value seeds the recursion.
/// A NaN after the seed yields NaN at that bar and leaves the running
/// average untouched.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if period == 0 {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev: Option<f64> = None;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        result[i] = next;
        prev = Some(next);
    }

    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.smoothing {
            AtrSmoothing::Exponential => 1,
            AtrSmoothing::Simple => self.period,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let tr = true_range(bars);
        match self.smoothing {
            AtrSmoothing::Exponential => ema(&tr, self.period),
            AtrSmoothing::Simple => rolling_mean(&tr, self.period),
        }
    }
}
