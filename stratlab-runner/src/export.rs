//! Artifact export: result JSON and trade-tape CSV.
//!
//! All persisted artifacts include a `schema_version` field. Newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stratlab_core::domain::Trade;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

const RESULT_FILE: &str = "result.json";
const TRADES_FILE: &str = "trades.csv";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Write a `BacktestResult` as pretty JSON to `path`.
pub fn write_result_json(result: &BacktestResult, path: &Path) -> Result<()> {
    let json = export_json(result)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV, one row per trade in entry order.
///
/// Columns: entry_index, entry_date, entry_price, exit_index, exit_date,
/// exit_price, exit_reason, realized_return, unrealized_return, stop_loss,
/// take_profit. Absent values are empty cells.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "entry_index",
        "entry_date",
        "entry_price",
        "exit_index",
        "exit_date",
        "exit_price",
        "exit_reason",
        "realized_return",
        "unrealized_return",
        "stop_loss",
        "take_profit",
    ])?;

    for t in trades {
        wtr.write_record([
            t.entry_index.to_string(),
            t.entry_date.to_string(),
            format!("{:.6}", t.entry_price),
            opt(t.exit_index, |i| i.to_string()),
            opt(t.exit_date, |d| d.to_string()),
            opt(t.exit_price, fixed),
            t.exit_reason.to_string(),
            opt(t.realized_return, fixed),
            opt(t.unrealized_return, fixed),
            opt(t.stop_loss, fixed),
            opt(t.take_profit, fixed),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the trade tape CSV to `path`.
pub fn write_trades_csv(trades: &[Trade], path: &Path) -> Result<()> {
    let csv = export_trades_csv(trades)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

fn fixed(v: f64) -> String {
    format!("{v:.6}")
}

fn opt<T>(value: Option<T>, fmt: impl Fn(T) -> String) -> String {
    value.map(fmt).unwrap_or_default()
}

// ─── Artifact directories ───────────────────────────────────────────

/// Directory name for a run: `<symbol>_<strategy>_<run-id-prefix>`.
///
/// The run id covers both the configuration and the dataset, so runs over
/// different date windows never share a directory.
pub fn artifact_dir_name(result: &BacktestResult) -> String {
    let symbol: String = result
        .symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("{}_{}_{}", symbol, result.strategy, result.short_run_id())
}

/// Save result.json and trades.csv under `output_dir`. Returns the run directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(artifact_dir_name(result));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_result_json(result, &run_dir.join(RESULT_FILE))?;
    write_trades_csv(&result.trades, &run_dir.join(TRADES_FILE))?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's result.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join(RESULT_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::synthetic_series;
    use crate::runner::run_backtest;
    use chrono::NaiveDate;
    use stratlab_core::strategy::Strategy;

    fn sample_result(name: &str) -> BacktestResult {
        result_until(name, 2023)
    }

    fn result_until(name: &str, end_year: i32) -> BacktestResult {
        let series = synthetic_series(
            "SPY",
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(end_year, 12, 31).unwrap(),
        )
        .unwrap();
        let strategy = Strategy::default_for(name).unwrap();
        run_backtest(&series, &strategy, 0.02).unwrap()
    }

    /// JSON float parsing may differ in the last bit; compare with a tolerance.
    fn assert_same_result(a: &BacktestResult, b: &BacktestResult) {
        assert_eq!(a.schema_version, b.schema_version);
        assert_eq!(a.symbol, b.symbol);
        assert_eq!(a.strategy, b.strategy);
        assert_eq!(a.parameters, b.parameters);
        assert_eq!(a.config_hash, b.config_hash);
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_eq!(a.trades.len(), b.trades.len());
        for (x, y) in a.trades.iter().zip(&b.trades) {
            assert_eq!(x.entry_date, y.entry_date);
            assert_eq!(x.exit_reason, y.exit_reason);
            assert!((x.entry_price - y.entry_price).abs() < 1e-9);
        }
        assert_eq!(a.stats.num_trades, b.stats.num_trades);
        assert!((a.stats.total_return - b.stats.total_return).abs() < 1e-12);
        assert!((a.stats.sharpe_ratio - b.stats.sharpe_ratio).abs() < 1e-9);
    }

    #[test]
    fn json_round_trip() {
        let result = sample_result("ma_crossover");
        let json = export_json(&result).unwrap();
        assert!(json.contains("\"schema_version\": 1"));
        let back = import_json(&json).unwrap();
        assert_same_result(&back, &result);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut result = sample_result("ma_crossover");
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn trades_csv_has_one_row_per_trade() {
        let result = sample_result("breakout_atr");
        let csv = export_trades_csv(&result.trades).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), result.trades.len() + 1);
        assert!(lines[0].starts_with("entry_index,entry_date,entry_price"));
    }

    #[test]
    fn open_trade_leaves_exit_cells_empty() {
        let trade = Trade {
            entry_index: 3,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            entry_price: 10.0,
            stop_loss: None,
            take_profit: None,
            exit_index: None,
            exit_date: None,
            exit_price: Some(11.0),
            exit_reason: stratlab_core::domain::ExitReason::Open,
            realized_return: None,
            unrealized_return: Some(0.1),
        };
        let csv = export_trades_csv(&[trade]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "3,2024-01-05,10.000000,,,11.000000,open,,0.100000,,"
        );
    }

    #[test]
    fn save_and_load_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result("rsi_threshold");
        let run_dir = save_artifacts(&result, dir.path()).unwrap();

        assert!(run_dir.join(RESULT_FILE).exists());
        assert!(run_dir.join(TRADES_FILE).exists());
        let name = run_dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("SPY_rsi_threshold_"), "{name}");

        let loaded = load_artifacts(&run_dir).unwrap();
        assert_same_result(&loaded, &result);
    }

    #[test]
    fn different_windows_get_different_dirs() {
        let short = result_until("ma_crossover", 2022);
        let long = result_until("ma_crossover", 2023);
        assert_eq!(short.config_hash, long.config_hash);
        assert_ne!(artifact_dir_name(&short), artifact_dir_name(&long));

        let dir = tempfile::tempdir().unwrap();
        let a = save_artifacts(&short, dir.path()).unwrap();
        let b = save_artifacts(&long, dir.path()).unwrap();
        assert_ne!(a, b);
        assert_eq!(load_artifacts(&a).unwrap().end_date, short.end_date);
        assert_eq!(load_artifacts(&b).unwrap().end_date, long.end_date);
    }

    #[test]
    fn dir_name_sanitizes_symbol() {
        let mut result = sample_result("supertrend");
        result.symbol = "BRK/B".into();
        assert!(artifact_dir_name(&result).starts_with("BRK_B_supertrend_"));
    }
}
