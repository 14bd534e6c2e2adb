//! RSI threshold: mean reversion on persistent oversold/overbought readings.
//!
//! Enters after RSI has been below `oversold` for two consecutive bars and
//! exits after it has been above `overbought` for two consecutive bars.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{check_period, scan, SignalGenerator, StrategyError};
use crate::domain::{PriceSeries, Signal, SignalSeries};
use crate::indicators::{IndicatorValues, Rsi};

const NAME: &str = "rsi_threshold";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RsiThreshold {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiThreshold {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl RsiThreshold {
    fn rsi_key(&self) -> String {
        format!("rsi_{}", self.period)
    }

    fn threshold_error(name: &'static str, reason: String) -> StrategyError {
        StrategyError::InvalidParameter {
            strategy: NAME,
            name,
            reason,
        }
    }
}

impl SignalGenerator for RsiThreshold {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("period".to_string(), self.period as f64),
            ("oversold".to_string(), self.oversold),
            ("overbought".to_string(), self.overbought),
        ])
    }

    fn validate(&self) -> Result<(), StrategyError> {
        check_period(NAME, "period", self.period)?;
        for (name, value) in [("oversold", self.oversold), ("overbought", self.overbought)] {
            if !(value > 0.0 && value < 100.0) {
                return Err(Self::threshold_error(
                    name,
                    format!("must lie strictly between 0 and 100, got {value}"),
                ));
            }
        }
        if self.oversold >= self.overbought {
            return Err(Self::threshold_error(
                "oversold",
                format!(
                    "must be below overbought ({} >= {})",
                    self.oversold, self.overbought
                ),
            ));
        }
        Ok(())
    }

    fn indicators(&self, series: &PriceSeries) -> IndicatorValues {
        let mut iv = IndicatorValues::new();
        iv.compute(&Rsi::new(self.period), series.bars());
        iv
    }

    fn generate_signals(&self, series: &PriceSeries, iv: &IndicatorValues) -> SignalSeries {
        let key = self.rsi_key();
        scan(series.len(), |i| {
            let (Some(cur), Some(prev)) = (iv.defined(&key, i), iv.defined(&key, i - 1)) else {
                return Signal::Hold;
            };

            if cur < self.oversold && prev < self.oversold {
                Signal::Enter
            } else if cur > self.overbought && prev > self.overbought {
                Signal::Exit
            } else {
                Signal::Hold
            }
        })
    }
}
