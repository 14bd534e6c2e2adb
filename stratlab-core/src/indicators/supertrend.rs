//! Supertrend: ATR band trend follower.
//!
//! Basic bands sit at hl2 ± multiplier × ATR, with ATR as the simple mean of
//! True Range over `period`. The trend direction is a running flag:
//! - flips up when close breaks above the previous bar's upper band,
//! - flips down when close breaks below the previous bar's lower band,
//! - otherwise persists.
//!
//! On a bar that crosses neither prior band, the active band only tightens
//! toward price: the lower band never falls during an uptrend and the upper
//! band never rises during a downtrend. A crossing bar keeps its basic band,
//! even when the cross confirms the current direction. Band i depends on band i-1 and the direction, so this
//! is a strictly sequential scan.
//!
//! Lookback: period. The initial direction is up.

use super::atr::{Atr, AtrSmoothing};
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Supertrend {
    period: usize,
    multiplier: f64,
    name: String,
}

/// Full output of the band scan, one entry per bar.
#[derive(Debug, Clone, PartialEq)]
pub struct SupertrendBands {
    pub atr: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    pub uptrend: Vec<bool>,
}

impl SupertrendBands {
    /// Active band: lower while up, upper while down.
    pub fn line(&self) -> Vec<f64> {
        self.uptrend
            .iter()
            .enumerate()
            .map(|(i, &up)| if up { self.lower[i] } else { self.upper[i] })
            .collect()
    }

    /// Direction as +1.0 (up) / -1.0 (down).
    pub fn direction(&self) -> Vec<f64> {
        self.uptrend
            .iter()
            .map(|&up| if up { 1.0 } else { -1.0 })
            .collect()
    }
}

impl Supertrend {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "Supertrend period must be >= 1");
        Self {
            period,
            multiplier,
            name: format!("supertrend_{period}_{multiplier}"),
        }
    }

    /// Key under which the direction series is stored next to the line.
    pub fn direction_name(&self) -> String {
        format!("{}_dir", self.name)
    }

    pub fn bands(&self, bars: &[Bar]) -> SupertrendBands {
        let n = bars.len();
        let atr = Atr::new(self.period, AtrSmoothing::Simple).compute(bars);

        let mut upper = vec![f64::NAN; n];
        let mut lower = vec![f64::NAN; n];
        for i in 0..n {
            let hl2 = bars[i].hl2();
            upper[i] = hl2 + self.multiplier * atr[i];
            lower[i] = hl2 - self.multiplier * atr[i];
        }

        let mut uptrend = vec![true; n];
        for i in 1..n {
            let close = bars[i].close;
            let was_up = uptrend[i - 1];

            // NaN bands compare false, so warmup bars keep the initial direction.
            // A cross resets the band to its basic value; only a bar that stays
            // inside both prior bands ratchets the active band.
            let up = if close > upper[i - 1] {
                true
            } else if close < lower[i - 1] {
                false
            } else {
                if was_up {
                    if lower[i] < lower[i - 1] {
                        lower[i] = lower[i - 1];
                    }
                } else if upper[i] > upper[i - 1] {
                    upper[i] = upper[i - 1];
                }
                was_up
            };

            uptrend[i] = up;
        }

        SupertrendBands {
            atr,
            upper,
            lower,
            uptrend,
        }
    }
}

impl Indicator for Supertrend {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        self.bands(bars).line()
    }
}
