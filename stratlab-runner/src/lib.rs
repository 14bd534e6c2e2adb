//! StratLab Runner: backtest orchestration, metrics and artifacts.
//!
//! This crate builds on `stratlab-core` to provide:
//! - TOML backtest configuration with validation before any computation
//! - CSV and synthetic price loading with a BLAKE3 dataset hash
//! - Single-run pipeline and parallel multi-strategy comparison
//! - Performance statistics over the trade list
//! - Result JSON and trade CSV artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;

pub use config::{BacktestConfig, BacktestSection, ConfigError};
pub use data_loader::{dataset_hash, load_csv, synthetic_series, DateRange, LoadError};
pub use export::{save_artifacts, write_result_json, write_trades_csv};
pub use metrics::{OpenPosition, PerformanceStats, ReasonStats};
pub use runner::{
    compare_strategies, run_backtest, run_from_config, BacktestResult, DataSource, RunError,
};
