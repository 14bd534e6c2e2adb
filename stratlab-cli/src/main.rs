//! StratLab CLI: run, compare and inspect single-asset strategy backtests.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file or a named strategy
//! - `compare`: run every strategy with default parameters on one series
//! - `signals`: print the non-Hold signals a strategy emits

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stratlab_core::domain::PriceSeries;
use stratlab_core::engine::run_strategy;
use stratlab_core::strategy::{SignalGenerator, Strategy};
use stratlab_runner::export::export_json;
use stratlab_runner::metrics::DEFAULT_RISK_FREE_RATE;
use stratlab_runner::runner::{compare_strategies, run_backtest, run_from_config, synthetic_window};
use stratlab_runner::{
    load_csv, save_artifacts, synthetic_series, BacktestConfig, BacktestResult, DataSource,
    DateRange,
};

#[derive(Parser)]
#[command(
    name = "stratlab",
    about = "StratLab CLI: single-asset strategy backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log filter directive (e.g. warn, info, stratlab_core=debug). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Print machine-readable JSON on stdout instead of the text summary.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or a named strategy.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Strategy: breakout_atr, ma_crossover, ma_hold, rsi_threshold, supertrend.
        #[arg(long)]
        strategy: Option<String>,

        /// Parameter override as key=value (repeatable, needs --strategy).
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,

        #[command(flatten)]
        data: DataArgs,

        /// Annual risk-free rate for the Sharpe ratio.
        #[arg(long)]
        risk_free_rate: Option<f64>,

        /// Output directory for result.json and trades.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Skip writing artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Run every strategy with default parameters and rank by total return.
    Compare {
        #[command(flatten)]
        data: DataArgs,

        /// Annual risk-free rate for the Sharpe ratio.
        #[arg(long, default_value_t = DEFAULT_RISK_FREE_RATE)]
        risk_free_rate: f64,
    },
    /// Print the non-Hold signals a strategy emits.
    Signals {
        /// Strategy name.
        #[arg(long)]
        strategy: String,

        /// Parameter override as key=value (repeatable).
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,

        #[command(flatten)]
        data: DataArgs,
    },
}

/// Where the price series comes from.
#[derive(Args, Default)]
struct DataArgs {
    /// CSV file with date,open,high,low,close[,volume] columns.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Use generated data for SYMBOL instead of a CSV.
    #[arg(long, value_name = "SYMBOL")]
    synthetic: Option<String>,

    /// Symbol label for CSV data. Defaults to the file stem.
    #[arg(long)]
    symbol: Option<String>,

    /// Start date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    end: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Run {
            config,
            strategy,
            params,
            data,
            risk_free_rate,
            output_dir,
            no_save,
        } => run_cmd(
            config,
            strategy,
            params,
            &data,
            risk_free_rate,
            (!no_save).then_some(output_dir.as_path()),
            cli.json,
        ),
        Commands::Compare {
            data,
            risk_free_rate,
        } => compare_cmd(&data, risk_free_rate, cli.json),
        Commands::Signals {
            strategy,
            params,
            data,
        } => signals_cmd(&strategy, params, &data, cli.json),
    }
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid --log-level '{level}'"))?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

// ─── run ────────────────────────────────────────────────────────────

fn run_cmd(
    config_path: Option<PathBuf>,
    strategy_name: Option<String>,
    params: Vec<(String, f64)>,
    data: &DataArgs,
    risk_free_rate: Option<f64>,
    output_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    // Validate mutually exclusive options
    if config_path.is_some() && strategy_name.is_some() {
        bail!("--config and --strategy are mutually exclusive");
    }

    let result = if let Some(path) = config_path {
        if !params.is_empty() {
            bail!("--param needs --strategy; put parameters in the config file instead");
        }
        let mut config = BacktestConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        if let Some(rate) = risk_free_rate {
            config.backtest.risk_free_rate = rate;
        }
        let source = apply_data_overrides(&mut config, data)?;
        run_from_config(&config, source)?
    } else {
        let Some(name) = strategy_name else {
            bail!("one of --config or --strategy is required");
        };
        let strategy = build_strategy(&name, params)?;
        let series = load_series(data)?;
        let mut result = run_backtest(
            &series,
            &strategy,
            risk_free_rate.unwrap_or(DEFAULT_RISK_FREE_RATE),
        )?;
        result.has_synthetic = data.synthetic.is_some();
        result
    };

    if json {
        println!("{}", export_json(&result)?);
    } else {
        print_summary(&result);
    }

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, dir)?;
        info!(dir = %run_dir.display(), "artifacts saved");
        if !json {
            println!("Artifacts saved to: {}", run_dir.display());
        }
    }
    Ok(())
}

/// Command-line data flags win over the config file's `[backtest]` values.
fn apply_data_overrides(config: &mut BacktestConfig, data: &DataArgs) -> Result<DataSource> {
    let section = &mut config.backtest;
    if let Some(start) = parse_date(data.start.as_deref(), "--start")? {
        section.start_date = Some(start);
    }
    if let Some(end) = parse_date(data.end.as_deref(), "--end")? {
        section.end_date = Some(end);
    }

    match (&data.data, &data.synthetic) {
        (Some(_), Some(_)) => bail!("--data and --synthetic are mutually exclusive"),
        (_, Some(symbol)) => {
            if data.symbol.is_some() {
                bail!("--symbol is for CSV data; --synthetic already names the symbol");
            }
            section.symbol = symbol.clone();
            Ok(DataSource::Synthetic)
        }
        (csv, None) => {
            if let Some(csv) = csv {
                section.data = Some(csv.clone());
            }
            if let Some(symbol) = &data.symbol {
                section.symbol = symbol.clone();
            }
            Ok(DataSource::Csv)
        }
    }
}

// ─── compare ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RankedRow<'a> {
    rank: usize,
    strategy: &'a str,
    total_return: f64,
    num_trades: usize,
    win_rate: f64,
    max_drawdown: f64,
    sharpe_ratio: f64,
}

fn compare_cmd(data: &DataArgs, risk_free_rate: f64, json: bool) -> Result<()> {
    let series = load_series(data)?;
    let strategies = Strategy::all_defaults();

    let outcomes = compare_strategies(&series, &strategies, risk_free_rate);
    let mut results = Vec::with_capacity(outcomes.len());
    for (strategy, outcome) in strategies.iter().zip(outcomes) {
        let result = outcome.with_context(|| format!("strategy {} failed", strategy.name()))?;
        results.push(result);
    }
    results.sort_by(|a, b| b.stats.total_return.total_cmp(&a.stats.total_return));

    let rows: Vec<RankedRow> = results
        .iter()
        .enumerate()
        .map(|(i, r)| RankedRow {
            rank: i + 1,
            strategy: &r.strategy,
            total_return: r.stats.total_return,
            num_trades: r.stats.num_trades,
            win_rate: r.stats.win_rate,
            max_drawdown: r.stats.max_drawdown,
            sharpe_ratio: r.stats.sharpe_ratio,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    println!("=== Strategy Comparison: {} ===", series.symbol());
    println!(
        "Period: {} to {} ({} bars)",
        series.first().date,
        series.last().date,
        series.len()
    );
    println!();
    println!(
        "{:<4} {:<15} {:>10} {:>7} {:>8} {:>8} {:>8}",
        "#", "Strategy", "Return", "Trades", "Win", "MaxDD", "Sharpe"
    );
    for row in &rows {
        println!(
            "{:<4} {:<15} {:>9.2}% {:>7} {:>7.1}% {:>7.2}% {:>8.3}",
            row.rank,
            row.strategy,
            row.total_return * 100.0,
            row.num_trades,
            row.win_rate * 100.0,
            row.max_drawdown * 100.0,
            row.sharpe_ratio
        );
    }
    if data.synthetic.is_some() {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
    Ok(())
}

// ─── signals ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SignalRow {
    index: usize,
    date: NaiveDate,
    close: f64,
    signal: stratlab_core::domain::Signal,
}

fn signals_cmd(name: &str, params: Vec<(String, f64)>, data: &DataArgs, json: bool) -> Result<()> {
    let strategy = build_strategy(name, params)?;
    let series = load_series(data)?;
    let run = run_strategy(&series, &strategy)?;

    let rows: Vec<SignalRow> = run
        .signals
        .events()
        .map(|(i, signal)| SignalRow {
            index: i,
            date: series.bars()[i].date,
            close: series.bars()[i].close,
            signal,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    println!("=== Signals: {} on {} ===", strategy.name(), series.symbol());
    for row in &rows {
        let label = match row.signal.as_i8() {
            1 => "ENTER",
            -1 => "EXIT",
            _ => "HOLD",
        };
        println!("{:>6}  {}  {:>12.4}  {}", row.index, row.date, row.close, label);
    }
    println!("{} signals over {} bars", rows.len(), series.len());
    println!();
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("parameter '{key}': {e}"))?;
    Ok((key.to_string(), value))
}

fn build_strategy(name: &str, params: Vec<(String, f64)>) -> Result<Strategy> {
    let overrides: BTreeMap<String, f64> = params.into_iter().collect();
    Ok(Strategy::from_params(name, &overrides)?)
}

fn parse_date(s: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    s.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("{flag} must be YYYY-MM-DD, got '{s}'"))
    })
    .transpose()
}

fn load_series(data: &DataArgs) -> Result<PriceSeries> {
    let start = parse_date(data.start.as_deref(), "--start")?;
    let end = parse_date(data.end.as_deref(), "--end")?;

    match (&data.data, &data.synthetic) {
        (Some(_), Some(_)) => bail!("--data and --synthetic are mutually exclusive"),
        (None, None) => bail!("one of --data or --synthetic is required"),
        (None, Some(symbol)) => {
            let (start, end) = synthetic_window(start, end);
            Ok(synthetic_series(symbol, start, end)?)
        }
        (Some(path), None) => {
            let symbol = data
                .symbol
                .clone()
                .or_else(|| path.file_stem().map(|s| s.to_string_lossy().to_string()))
                .unwrap_or_else(|| "UNKNOWN".to_string());
            load_csv(path, &symbol, DateRange::new(start, end))
                .with_context(|| format!("failed to load {}", path.display()))
        }
    }
}

fn print_summary(result: &BacktestResult) {
    let stats = &result.stats;

    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Strategy:       {}", result.strategy);
    println!(
        "Period:         {} to {}",
        result.start_date, result.end_date
    );
    println!("Bars:           {}", result.bar_count);
    println!("Signals:        {}", result.signal_count);
    println!("Config Hash:    {}", result.short_hash());
    println!("Run ID:         {}", result.short_run_id());

    println!();
    println!("--- Parameters ---");
    for (key, value) in &result.parameters {
        println!("{key:<18}{value}");
    }

    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", stats.total_return * 100.0);
    println!("Trades:         {}", stats.num_trades);
    println!("Win Rate:       {:.1}%", stats.win_rate * 100.0);
    println!("Avg Return:     {:.2}%", stats.avg_return * 100.0);
    println!("Max Drawdown:   {:.2}%", stats.max_drawdown * 100.0);
    println!("Worst Trade:    {:.2}%", stats.worst_trade * 100.0);
    println!("Sharpe:         {:.3}", stats.sharpe_ratio);

    if !stats.exit_reason_breakdown.is_empty() {
        println!();
        println!("--- Exit Reasons ---");
        for (reason, rs) in &stats.exit_reason_breakdown {
            println!(
                "{:<16}{:>4} trades, avg {:.2}%",
                reason.to_string(),
                rs.count,
                rs.avg_return * 100.0
            );
        }
    }

    if let Some(open) = &stats.open_position {
        println!();
        println!("--- Open Position ---");
        println!("Entry Date:     {}", open.entry_date);
        println!("Entry Price:    {:.4}", open.entry_price);
        println!("Current Price:  {:.4}", open.current_price);
        println!("Unrealized:     {:.2}%", open.unrealized_return * 100.0);
    }

    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
