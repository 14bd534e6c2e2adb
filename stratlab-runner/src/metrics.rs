//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function of the trade list. Only closed trades
//! contribute; a trailing open trade is reported separately as
//! `open_position`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratlab_core::domain::{ExitReason, Trade};

/// Trading days per year used to annualize and de-annualize rates.
pub const TRADING_DAYS: f64 = 252.0;

/// Default annual risk-free rate for the Sharpe ratio.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Aggregate performance statistics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_return: f64,
    pub num_trades: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    /// Peak-to-trough decline of the compounded equity curve, as a positive fraction.
    pub max_drawdown: f64,
    pub worst_trade: f64,
    pub sharpe_ratio: f64,
    pub exit_reason_breakdown: BTreeMap<ExitReason, ReasonStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_position: Option<OpenPosition>,
}

/// Count and mean return of the closed trades sharing one exit reason.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReasonStats {
    pub count: usize,
    pub avg_return: f64,
}

/// A position still held at the end of the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_return: f64,
}

impl PerformanceStats {
    /// Compute all statistics from a trade list and an annual risk-free rate.
    pub fn compute(trades: &[Trade], risk_free_rate: f64) -> Self {
        let returns = closed_returns(trades);
        Self {
            total_return: total_return(&returns),
            num_trades: returns.len(),
            win_rate: win_rate(&returns),
            avg_return: mean_f64(&returns),
            max_drawdown: max_drawdown(&returns),
            worst_trade: worst_trade(&returns),
            sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
            exit_reason_breakdown: exit_reason_breakdown(trades),
            open_position: open_position(trades),
        }
    }

    /// Neutral statistics for a run with no trades.
    pub fn empty() -> Self {
        Self::compute(&[], DEFAULT_RISK_FREE_RATE)
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Realized returns of closed trades, in trade order.
pub fn closed_returns(trades: &[Trade]) -> Vec<f64> {
    trades.iter().filter_map(|t| t.realized_return).collect()
}

/// Compounded return: Π(1 + r) − 1. Zero for no trades.
pub fn total_return(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

/// Fraction of trades with a strictly positive return.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let winners = returns.iter().filter(|&&r| r > 0.0).count();
    winners as f64 / returns.len() as f64
}

/// Maximum drawdown of the compounded equity curve starting at 1.0.
///
/// Reported as a non-negative fraction (0.15 = 15% below the running peak).
/// Returns 0.0 if equity never falls below a previous peak.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;

    for r in returns {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Smallest single-trade return. Zero for no trades.
pub fn worst_trade(returns: &[f64]) -> f64 {
    returns.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

/// Annualized Sharpe ratio of per-trade returns.
///
/// Sharpe = mean(r − rf/252) / std(r − rf/252) × √252, population standard
/// deviation. Returns 0.0 with fewer than 2 returns or zero variance.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * TRADING_DAYS.sqrt()
}

/// Per-exit-reason counts and mean returns over closed trades.
pub fn exit_reason_breakdown(trades: &[Trade]) -> BTreeMap<ExitReason, ReasonStats> {
    let mut grouped: BTreeMap<ExitReason, Vec<f64>> = BTreeMap::new();
    for t in trades {
        if let Some(r) = t.realized_return {
            grouped.entry(t.exit_reason).or_default().push(r);
        }
    }
    grouped
        .into_iter()
        .map(|(reason, rs)| {
            (
                reason,
                ReasonStats {
                    count: rs.len(),
                    avg_return: mean_f64(&rs),
                },
            )
        })
        .collect()
}

/// The trailing open trade, if the list ends with one.
pub fn open_position(trades: &[Trade]) -> Option<OpenPosition> {
    let last = trades.last().filter(|t| t.is_open())?;
    Some(OpenPosition {
        entry_date: last.entry_date,
        entry_price: last.entry_price,
        current_price: last.exit_price.unwrap_or(last.entry_price),
        unrealized_return: last.unrealized_return.unwrap_or(0.0),
    })
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
