//! SuperTrend flip strategy.
//!
//! Enters on the bar where the SuperTrend direction turns from down to up and
//! exits where it turns from up to down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{check_period, check_positive, scan, SignalGenerator, StrategyError};
use crate::domain::{PriceSeries, Signal, SignalSeries};
use crate::indicators::{Indicator, IndicatorValues, Supertrend};

const NAME: &str = "supertrend";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupertrendFlip {
    pub period: usize,
    pub multiplier: f64,
}

impl Default for SupertrendFlip {
    fn default() -> Self {
        Self {
            period: 10,
            multiplier: 3.0,
        }
    }
}

impl SupertrendFlip {
    fn indicator(&self) -> Supertrend {
        Supertrend::new(self.period, self.multiplier)
    }
}

impl SignalGenerator for SupertrendFlip {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("period".to_string(), self.period as f64),
            ("multiplier".to_string(), self.multiplier),
        ])
    }

    fn validate(&self) -> Result<(), StrategyError> {
        check_period(NAME, "period", self.period)?;
        check_positive(NAME, "multiplier", self.multiplier)
    }

    fn indicators(&self, series: &PriceSeries) -> IndicatorValues {
        let st = self.indicator();
        let bands = st.bands(series.bars());
        let mut iv = IndicatorValues::new();
        iv.insert(st.name(), bands.line());
        iv.insert(st.direction_name(), bands.direction());
        iv
    }

    fn generate_signals(&self, series: &PriceSeries, iv: &IndicatorValues) -> SignalSeries {
        let st = self.indicator();
        let (line_key, dir_key) = (st.name().to_string(), st.direction_name());

        scan(series.len(), |i| {
            // Direction only carries information once the line is defined.
            if iv.defined(&line_key, i).is_none() || iv.defined(&line_key, i - 1).is_none() {
                return Signal::Hold;
            }
            let (Some(cur), Some(prev)) = (iv.defined(&dir_key, i), iv.defined(&dir_key, i - 1))
            else {
                return Signal::Hold;
            };

            if cur > 0.0 && prev < 0.0 {
                Signal::Enter
            } else if cur < 0.0 && prev > 0.0 {
                Signal::Exit
            } else {
                Signal::Hold
            }
        })
    }
}
