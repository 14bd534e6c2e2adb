//! Dual moving average crossover: golden cross and death cross detection.
//!
//! Enters when the short SMA crosses above the long SMA (golden cross) and
//! exits when it crosses back below (death cross). `MaHold` shares the entry
//! rule but never exits: its position stays open and is reported unrealized.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{check_period, scan, SignalGenerator, StrategyError};
use crate::domain::{PriceSeries, Signal, SignalSeries};
use crate::engine::ExitRules;
use crate::indicators::{IndicatorValues, Sma};

/// Moving average crossover.
///
/// # Indicator dependencies
/// - Fast: `sma_{short_period}`
/// - Slow: `sma_{long_period}`
///
/// `short_period >= long_period` is accepted; it simply yields degenerate
/// (mirrored or absent) crossings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaCrossover {
    pub short_period: usize,
    pub long_period: usize,
}

impl Default for MaCrossover {
    fn default() -> Self {
        Self {
            short_period: 5,
            long_period: 20,
        }
    }
}

/// Where the fast line stands against the slow line across two bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Golden,
    Death,
    None,
}

impl MaCrossover {
    fn fast_key(&self) -> String {
        format!("sma_{}", self.short_period)
    }

    fn slow_key(&self) -> String {
        format!("sma_{}", self.long_period)
    }

    fn check(&self, name: &'static str) -> Result<(), StrategyError> {
        check_period(name, "short_period", self.short_period)?;
        check_period(name, "long_period", self.long_period)
    }

    fn params(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("short_period".to_string(), self.short_period as f64),
            ("long_period".to_string(), self.long_period as f64),
        ])
    }

    fn annotate(&self, series: &PriceSeries) -> IndicatorValues {
        let mut iv = IndicatorValues::new();
        iv.compute(&Sma::new(self.short_period), series.bars());
        iv.compute(&Sma::new(self.long_period), series.bars());
        iv
    }

    fn cross_at(&self, iv: &IndicatorValues, i: usize) -> Cross {
        let (fast, slow) = (self.fast_key(), self.slow_key());
        let (Some(fast_cur), Some(slow_cur), Some(fast_prev), Some(slow_prev)) = (
            iv.defined(&fast, i),
            iv.defined(&slow, i),
            iv.defined(&fast, i - 1),
            iv.defined(&slow, i - 1),
        ) else {
            return Cross::None;
        };

        if fast_cur > slow_cur && fast_prev <= slow_prev {
            Cross::Golden
        } else if fast_cur < slow_cur && fast_prev >= slow_prev {
            Cross::Death
        } else {
            Cross::None
        }
    }
}

impl SignalGenerator for MaCrossover {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        self.params()
    }

    fn validate(&self) -> Result<(), StrategyError> {
        self.check("ma_crossover")
    }

    fn indicators(&self, series: &PriceSeries) -> IndicatorValues {
        self.annotate(series)
    }

    fn generate_signals(&self, series: &PriceSeries, iv: &IndicatorValues) -> SignalSeries {
        scan(series.len(), |i| match self.cross_at(iv, i) {
            Cross::Golden => Signal::Enter,
            Cross::Death => Signal::Exit,
            Cross::None => Signal::Hold,
        })
    }
}

/// Golden-cross entry, held to the end of the series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaHold(pub MaCrossover);

impl SignalGenerator for MaHold {
    fn name(&self) -> &'static str {
        "ma_hold"
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        self.0.params()
    }

    fn validate(&self) -> Result<(), StrategyError> {
        self.0.check("ma_hold")
    }

    fn indicators(&self, series: &PriceSeries) -> IndicatorValues {
        self.0.annotate(series)
    }

    fn generate_signals(&self, series: &PriceSeries, iv: &IndicatorValues) -> SignalSeries {
        scan(series.len(), |i| match self.0.cross_at(iv, i) {
            Cross::Golden => Signal::Enter,
            Cross::Death | Cross::None => Signal::Hold,
        })
    }

    fn exit_rules(&self) -> ExitRules {
        ExitRules::hold_to_end()
    }
}
