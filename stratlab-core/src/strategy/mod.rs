//! Strategies: rules that turn a price series into entry/exit signals.
//!
//! Every strategy is a plain parameter struct implementing `SignalGenerator`.
//! `Strategy` is the closed set of variants, tagged by `type` when
//! (de)serialized, so a whole strategy configuration round-trips through
//! TOML or JSON:
//!
//! ```toml
//! type = "rsi_threshold"
//! period = 14
//! oversold = 30.0
//! overbought = 70.0
//! ```
//!
//! Generation runs in two pure stages: `indicators()` annotates the series
//! with the derived columns the rule needs, then `generate_signals()` reads
//! those columns bar by bar. Neither stage sees position state; entry/exit
//! bookkeeping belongs to the simulator.

pub mod breakout_atr;
pub mod ma_crossover;
pub mod rsi_threshold;
pub mod supertrend;

pub use breakout_atr::BreakoutAtr;
pub use ma_crossover::{MaCrossover, MaHold};
pub use rsi_threshold::RsiThreshold;
pub use supertrend::SupertrendFlip;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{PriceSeries, Signal, SignalSeries};
use crate::engine::ExitRules;
use crate::indicators::IndicatorValues;

/// Configuration errors, reported before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("{strategy}: invalid {name}: {reason}")]
    InvalidParameter {
        strategy: &'static str,
        name: &'static str,
        reason: String,
    },

    #[error("unknown strategy '{0}' (valid: breakout_atr, ma_crossover, ma_hold, rsi_threshold, supertrend)")]
    Unknown(String),

    #[error("bad parameters for '{strategy}': {reason}")]
    BadParameters { strategy: String, reason: String },
}

/// Shared capability set of all strategies.
pub trait SignalGenerator: Send + Sync {
    /// Stable identifier, also the `type` tag in configuration files.
    fn name(&self) -> &'static str;

    /// Numeric parameters in deterministic key order.
    fn parameters(&self) -> BTreeMap<String, f64>;

    /// Reject out-of-domain parameters. Never clamps.
    fn validate(&self) -> Result<(), StrategyError>;

    /// Annotation stage: compute every indicator the rule reads.
    fn indicators(&self, series: &PriceSeries) -> IndicatorValues;

    /// One signal per bar. Bar 0 and any bar whose inputs are undefined are Hold.
    fn generate_signals(&self, series: &PriceSeries, indicators: &IndicatorValues)
        -> SignalSeries;

    /// Exit conditions the simulator applies on top of the signals.
    fn exit_rules(&self) -> ExitRules {
        ExitRules::signal_only()
    }

    /// Volatility series used to place stop/target levels at entry.
    fn volatility<'a>(&self, _indicators: &'a IndicatorValues) -> Option<&'a [f64]> {
        None
    }
}

/// The closed set of strategy variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    BreakoutAtr(BreakoutAtr),
    MaCrossover(MaCrossover),
    MaHold(MaHold),
    RsiThreshold(RsiThreshold),
    Supertrend(SupertrendFlip),
}

impl Strategy {
    pub const NAMES: [&'static str; 5] = [
        "breakout_atr",
        "ma_crossover",
        "ma_hold",
        "rsi_threshold",
        "supertrend",
    ];

    /// The variant named `name` with its documented default parameters.
    pub fn default_for(name: &str) -> Result<Self, StrategyError> {
        match name {
            "breakout_atr" => Ok(Self::BreakoutAtr(BreakoutAtr::default())),
            "ma_crossover" => Ok(Self::MaCrossover(MaCrossover::default())),
            "ma_hold" => Ok(Self::MaHold(MaHold::default())),
            "rsi_threshold" => Ok(Self::RsiThreshold(RsiThreshold::default())),
            "supertrend" => Ok(Self::Supertrend(SupertrendFlip::default())),
            other => Err(StrategyError::Unknown(other.to_string())),
        }
    }

    /// Every variant with default parameters, in `NAMES` order.
    pub fn all_defaults() -> Vec<Self> {
        Self::NAMES
            .iter()
            .filter_map(|name| Self::default_for(name).ok())
            .collect()
    }

    /// Build a variant from its name plus parameter overrides.
    ///
    /// Unspecified parameters keep their defaults; unknown keys and values
    /// that do not fit the field type are errors. The result is validated.
    pub fn from_params(name: &str, params: &BTreeMap<String, f64>) -> Result<Self, StrategyError> {
        if !Self::NAMES.contains(&name) {
            return Err(StrategyError::Unknown(name.to_string()));
        }

        let mut map = serde_json::Map::new();
        map.insert("type".into(), serde_json::Value::from(name));
        for (key, &value) in params {
            map.insert(key.clone(), json_number(value));
        }

        let strategy: Self = serde_json::from_value(serde_json::Value::Object(map)).map_err(
            |e| StrategyError::BadParameters {
                strategy: name.to_string(),
                reason: e.to_string(),
            },
        )?;
        strategy.validate()?;
        Ok(strategy)
    }

    pub fn generator(&self) -> &dyn SignalGenerator {
        match self {
            Self::BreakoutAtr(s) => s,
            Self::MaCrossover(s) => s,
            Self::MaHold(s) => s,
            Self::RsiThreshold(s) => s,
            Self::Supertrend(s) => s,
        }
    }
}

impl SignalGenerator for Strategy {
    fn name(&self) -> &'static str {
        self.generator().name()
    }

    fn parameters(&self) -> BTreeMap<String, f64> {
        self.generator().parameters()
    }

    fn validate(&self) -> Result<(), StrategyError> {
        self.generator().validate()
    }

    fn indicators(&self, series: &PriceSeries) -> IndicatorValues {
        self.generator().indicators(series)
    }

    fn generate_signals(
        &self,
        series: &PriceSeries,
        indicators: &IndicatorValues,
    ) -> SignalSeries {
        self.generator().generate_signals(series, indicators)
    }

    fn exit_rules(&self) -> ExitRules {
        self.generator().exit_rules()
    }

    fn volatility<'a>(&self, indicators: &'a IndicatorValues) -> Option<&'a [f64]> {
        self.generator().volatility(indicators)
    }
}

/// Integral values become JSON integers so they can fill `usize` fields.
fn json_number(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Run `rule` for bars 1..n; bar 0 is always Hold.
pub(crate) fn scan(len: usize, mut rule: impl FnMut(usize) -> Signal) -> SignalSeries {
    let mut signals = vec![Signal::Hold; len];
    for (i, slot) in signals.iter_mut().enumerate().skip(1) {
        *slot = rule(i);
    }
    SignalSeries::from_vec(signals)
}

pub(crate) fn check_period(
    strategy: &'static str,
    name: &'static str,
    value: usize,
) -> Result<(), StrategyError> {
    if value == 0 {
        return Err(StrategyError::InvalidParameter {
            strategy,
            name,
            reason: "must be >= 1".into(),
        });
    }
    Ok(())
}

pub(crate) fn check_positive(
    strategy: &'static str,
    name: &'static str,
    value: f64,
) -> Result<(), StrategyError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(StrategyError::InvalidParameter {
            strategy,
            name,
            reason: format!("must be a positive finite number, got {value}"),
        });
    }
    Ok(())
}
