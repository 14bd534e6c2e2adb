//! Trade: one long round trip (or the single still-open position).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
///
/// `Open` marks a position still held when the series ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeStop,
    SignalReversal,
    ForceClose,
    Open,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TimeStop => "time_stop",
            ExitReason::SignalReversal => "signal_reversal",
            ExitReason::ForceClose => "force_close",
            ExitReason::Open => "open",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-unit long trade.
///
/// Closed trades carry `exit_date`, `exit_price` and `realized_return`.
/// An open trade has no `exit_date`, reports the last close as `exit_price`,
/// and carries `unrealized_return` instead of `realized_return`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,

    // ── Volatility exits (ATR strategies only) ──
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,

    // ── Exit ──
    pub exit_index: Option<usize>,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub exit_reason: ExitReason,

    // ── Outcome ──
    pub realized_return: Option<f64>,
    pub unrealized_return: Option<f64>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_date.is_none()
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }
}

/// Fractional return of a long unit bought at `entry` and valued at `exit`.
pub fn simple_return(entry: f64, exit: f64) -> f64 {
    (exit - entry) / entry
}
