//! Backtest runner wires together data, strategy, simulator and metrics.
//!
//! Entry points:
//! - `run_backtest()`: one strategy over a pre-loaded series. No I/O.
//! - `compare_strategies()`: several strategies over one shared series, in parallel.
//! - `run_from_config()`: loads data per a `BacktestConfig`, then runs. Used by the CLI.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, info_span};

use stratlab_core::domain::{PriceSeries, Trade};
use stratlab_core::engine::{run_strategy, EngineError};
use stratlab_core::strategy::{SignalGenerator, Strategy};

use crate::config::{
    config_hash, run_id, validate_risk_free_rate, BacktestConfig, ConfigError,
};
use crate::data_loader::{dataset_hash, load_csv, synthetic_series, DateRange, LoadError};
use crate::metrics::PerformanceStats;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("no data source for '{0}': set [backtest] data or use synthetic data")]
    NoDataSource(String),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub strategy: String,
    pub parameters: BTreeMap<String, f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    /// Number of non-Hold signals.
    pub signal_count: usize,
    pub stats: PerformanceStats,
    pub trades: Vec<Trade>,
    pub dataset_hash: String,
    pub config_hash: String,
    #[serde(default)]
    pub has_synthetic: bool,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// First 12 hex characters of the config hash.
    pub fn short_hash(&self) -> &str {
        &self.config_hash[..self.config_hash.len().min(12)]
    }

    /// Identity of the run: settings plus the exact bars they ran on.
    pub fn run_id(&self) -> String {
        run_id(&self.config_hash, &self.dataset_hash)
    }

    /// First 12 hex characters of [`Self::run_id`], for artifact directory names.
    pub fn short_run_id(&self) -> String {
        let mut id = self.run_id();
        id.truncate(12);
        id
    }
}

/// Run one strategy over a pre-loaded series. No I/O.
///
/// Strategy parameters and the risk-free rate are validated before any
/// indicator is computed.
pub fn run_backtest(
    series: &PriceSeries,
    strategy: &Strategy,
    risk_free_rate: f64,
) -> Result<BacktestResult, RunError> {
    validate_risk_free_rate(risk_free_rate)?;

    let _span = info_span!(
        "backtest",
        symbol = series.symbol(),
        strategy = strategy.name()
    )
    .entered();

    let run = run_strategy(series, strategy)?;
    let stats = PerformanceStats::compute(&run.trades, risk_free_rate);
    let signal_count = run.signals.iter().filter(|s| !s.is_hold()).count();

    info!(
        bars = series.len(),
        signals = signal_count,
        trades = stats.num_trades,
        total_return = stats.total_return,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        symbol: series.symbol().to_string(),
        strategy: strategy.name().to_string(),
        parameters: strategy.parameters(),
        start_date: series.first().date,
        end_date: series.last().date,
        bar_count: series.len(),
        signal_count,
        stats,
        trades: run.trades,
        dataset_hash: dataset_hash(series),
        config_hash: config_hash(series.symbol(), strategy, risk_free_rate),
        has_synthetic: false,
    })
}

/// Run several strategies over one shared series in parallel.
///
/// Results come back in input order, one per strategy, each independently
/// fallible.
pub fn compare_strategies(
    series: &PriceSeries,
    strategies: &[Strategy],
    risk_free_rate: f64,
) -> Vec<Result<BacktestResult, RunError>> {
    let _span = info_span!(
        "compare",
        symbol = series.symbol(),
        strategies = strategies.len()
    )
    .entered();

    strategies
        .par_iter()
        .map(|strategy| run_backtest(series, strategy, risk_free_rate))
        .collect()
}

/// Where a config-driven run gets its bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// The CSV named by `[backtest] data`.
    Csv,
    /// Synthetic bars over the config's date range.
    Synthetic,
}

/// Load the series a config describes.
pub fn load_series(config: &BacktestConfig, source: DataSource) -> Result<PriceSeries, RunError> {
    let section = &config.backtest;
    match source {
        DataSource::Csv => {
            let path = section
                .data
                .as_deref()
                .ok_or_else(|| RunError::NoDataSource(section.symbol.clone()))?;
            let range = DateRange::new(section.start_date, section.end_date);
            Ok(load_csv(path, &section.symbol, range)?)
        }
        DataSource::Synthetic => {
            let (start, end) = synthetic_window(section.start_date, section.end_date);
            Ok(synthetic_series(&section.symbol, start, end)?)
        }
    }
}

/// Run a backtest from a `BacktestConfig` (loads data first).
pub fn run_from_config(
    config: &BacktestConfig,
    source: DataSource,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let series = load_series(config, source)?;
    let mut result = run_backtest(&series, &config.strategy, config.backtest.risk_free_rate)?;
    result.has_synthetic = source == DataSource::Synthetic;
    Ok(result)
}

/// Default synthetic window: the given bounds, else 2020-01-01 through 2024-12-31.
pub fn synthetic_window(start: Option<NaiveDate>, end: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    let default_start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN);
    let default_end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or(NaiveDate::MAX);
    (start.unwrap_or(default_start), end.unwrap_or(default_end))
}
