//! Backtest pipeline: validate → annotate → signal → simulate.
//!
//! Each stage is a pure transformation returning a new value; the price
//! series is borrowed throughout and never modified.

pub mod simulator;

pub use simulator::{simulate, ExitRules};

use thiserror::Error;
use tracing::debug_span;

use crate::domain::{PriceSeries, SeriesError, SignalSeries, Trade};
use crate::indicators::IndicatorValues;
use crate::strategy::{SignalGenerator, StrategyError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Everything one strategy produced for one series.
#[derive(Debug, Clone)]
pub struct StrategyRun {
    pub indicators: IndicatorValues,
    pub signals: SignalSeries,
    pub trades: Vec<Trade>,
}

/// Run `strategy` over `series`. Parameters are validated before any
/// indicator is computed.
pub fn run_strategy(
    series: &PriceSeries,
    strategy: &dyn SignalGenerator,
) -> Result<StrategyRun, EngineError> {
    let _span = debug_span!("strategy", name = strategy.name(), symbol = series.symbol()).entered();

    strategy.validate()?;
    let indicators = strategy.indicators(series);
    let signals = strategy.generate_signals(series, &indicators);
    let trades = simulate(
        series,
        &signals,
        &strategy.exit_rules(),
        strategy.volatility(&indicators),
    )?;

    Ok(StrategyRun {
        indicators,
        signals,
        trades,
    })
}
