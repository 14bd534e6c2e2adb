//! Breakout-ATR: channel breakout confirmed by expanding volatility.
//!
//! Enters when the close exceeds the highest high of the previous
//! `high_period` bars (the window ends one bar before the signal bar) while
//! ATR sits above its own `high_period` rolling mean. Emits no exit signal:
//! exits come from the ATR stop, the ATR target, the holding-period limit,
//! or liquidation on the last bar.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{check_period, check_positive, scan, SignalGenerator, StrategyError};
use crate::domain::{PriceSeries, Signal, SignalSeries};
use crate::engine::ExitRules;
use crate::indicators::{
    rolling_mean, Atr, AtrSmoothing, Indicator, IndicatorValues, RollingExtreme,
};

const NAME: &str = "breakout_atr";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakoutAtr {
    pub atr_period: usize,
    pub high_period: usize,
    /// Stop distance below entry, in ATRs.
    pub stop_multiplier: f64,
    /// Target distance above entry, in ATRs.
    pub profit_multiplier: f64,
    pub max_hold_days: u32,
    pub smoothing: AtrSmoothing,
}

impl Default for BreakoutAtr {
    fn default() -> Self {
        Self {
            atr_period: 14,
            high_period: 20,
            stop_multiplier: 1.5,
            profit_multiplier: 2.0,
            max_hold_days: 20,
            smoothing: AtrSmoothing::Exponential,
        }
    }
}

impl BreakoutAtr {
    fn atr(&self) -> Atr {
        Atr::new(self.atr_period, self.smoothing)
    }

    fn atr_key(&self) -> String {
        self.atr().name().to_string()
    }

    fn atr_mean_key(&self) -> String {
        format!("{}_mean_{}", self.atr_key(), self.high_period)
    }

    fn high_key(&self) -> String {
        format!("rolling_high_{}", self.high_period)
    }
}

impl SignalGenerator for BreakoutAtr {
    fn name(&self) -> &'static str {
        NAME
    }

    /// `ema_smoothing` is 1.0 for exponential ATR and 0.0 for the simple mean.
    fn parameters(&self) -> BTreeMap<String, f64> {
        let ema_smoothing = match self.smoothing {
            AtrSmoothing::Exponential => 1.0,
            AtrSmoothing::Simple => 0.0,
        };
        BTreeMap::from([
            ("atr_period".to_string(), self.atr_period as f64),
            ("high_period".to_string(), self.high_period as f64),
            ("stop_multiplier".to_string(), self.stop_multiplier),
            ("profit_multiplier".to_string(), self.profit_multiplier),
            ("max_hold_days".to_string(), f64::from(self.max_hold_days)),
            ("ema_smoothing".to_string(), ema_smoothing),
        ])
    }

    fn validate(&self) -> Result<(), StrategyError> {
        check_period(NAME, "atr_period", self.atr_period)?;
        check_period(NAME, "high_period", self.high_period)?;
        check_positive(NAME, "stop_multiplier", self.stop_multiplier)?;
        check_positive(NAME, "profit_multiplier", self.profit_multiplier)?;
        if self.max_hold_days == 0 {
            return Err(StrategyError::InvalidParameter {
                strategy: NAME,
                name: "max_hold_days",
                reason: "must be >= 1".into(),
            });
        }
        Ok(())
    }

    fn indicators(&self, series: &PriceSeries) -> IndicatorValues {
        let bars = series.bars();
        let mut iv = IndicatorValues::new();

        let atr = self.atr().compute(bars);
        iv.insert(self.atr_mean_key(), rolling_mean(&atr, self.high_period));
        iv.insert(self.atr_key(), atr);
        iv.compute(&RollingExtreme::high(self.high_period), bars);
        iv
    }

    fn generate_signals(&self, series: &PriceSeries, iv: &IndicatorValues) -> SignalSeries {
        let bars = series.bars();
        let (atr_key, mean_key, high_key) = (self.atr_key(), self.atr_mean_key(), self.high_key());

        scan(bars.len(), |i| {
            let (Some(prior_high), Some(atr), Some(atr_mean)) = (
                iv.defined(&high_key, i - 1),
                iv.defined(&atr_key, i),
                iv.defined(&mean_key, i),
            ) else {
                return Signal::Hold;
            };

            if bars[i].close > prior_high && atr > atr_mean {
                Signal::Enter
            } else {
                Signal::Hold
            }
        })
    }

    fn exit_rules(&self) -> ExitRules {
        ExitRules {
            stop_loss_multiplier: Some(self.stop_multiplier),
            take_profit_multiplier: Some(self.profit_multiplier),
            max_hold_days: Some(self.max_hold_days),
            liquidate_at_end: true,
        }
    }

    fn volatility<'a>(&self, iv: &'a IndicatorValues) -> Option<&'a [f64]> {
        iv.get_series(&self.atr_key())
    }
}
