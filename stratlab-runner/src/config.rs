//! Serializable backtest configuration.
//!
//! A configuration file has two tables: `[backtest]` (what to run on) and
//! `[strategy]` (which rule, tagged by `type`, with its parameters).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::strategy::{SignalGenerator, Strategy, StrategyError};

use crate::metrics::DEFAULT_RISK_FREE_RATE;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("risk_free_rate must be finite, got {0}")]
    InvalidRiskFreeRate(f64),
}

/// Complete description of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub strategy: Strategy,
}

/// The `[backtest]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestSection {
    pub symbol: String,

    /// CSV price file. Relative paths resolve against the config file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PathBuf>,

    /// Inclusive start date filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    /// Inclusive end date filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    /// Annual risk-free rate for the Sharpe ratio.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

fn default_risk_free_rate() -> f64 {
    DEFAULT_RISK_FREE_RATE
}

impl BacktestConfig {
    /// Read, parse and validate a TOML configuration file.
    ///
    /// A relative `data` path is rebased onto the file's parent directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;

        if let (Some(data), Some(parent)) = (config.backtest.data.as_mut(), path.parent()) {
            if data.is_relative() {
                *data = parent.join(&*data);
            }
        }
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Strategy parameters and the risk-free rate are checked here, before
    /// any data is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        validate_risk_free_rate(self.backtest.risk_free_rate)
    }

    /// Deterministic BLAKE3 hash of the configuration, hex encoded.
    ///
    /// Covers symbol, strategy and risk-free rate. The data window is not
    /// included: combine with the dataset hash via [`run_id`] to name a run.
    pub fn config_hash(&self) -> String {
        config_hash(&self.backtest.symbol, &self.strategy, self.backtest.risk_free_rate)
    }
}

/// A NaN or infinite rate would make the Sharpe ratio unrepresentable in JSON.
pub fn validate_risk_free_rate(rate: f64) -> Result<(), ConfigError> {
    if rate.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidRiskFreeRate(rate))
    }
}

/// BLAKE3 over the canonical JSON of what determines a run's output.
pub fn config_hash(symbol: &str, strategy: &Strategy, risk_free_rate: f64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    // Enum of plain numeric structs: serialization cannot fail.
    let json = serde_json::to_string(strategy).unwrap_or_default();
    hasher.update(json.as_bytes());
    hasher.update(&risk_free_rate.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

/// BLAKE3 over a config hash and a dataset hash.
///
/// Two runs share an id only when they used the same settings on the same bars.
pub fn run_id(config_hash: &str, dataset_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config_hash.as_bytes());
    hasher.update(b"\0");
    hasher.update(dataset_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}
