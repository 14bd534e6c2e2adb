//! Position simulator: a two-state machine (Flat / Long) walking the bars.
//!
//! On each bar while Long, exit conditions are checked in strict priority:
//!
//! 1. close < stop_loss            → `StopLoss`
//! 2. close > take_profit          → `TakeProfit`
//! 3. calendar days held ≥ limit   → `TimeStop`
//! 4. Exit signal on this bar      → `SignalReversal`
//! 5. last bar, liquidation on     → `ForceClose`
//!
//! The entry bar itself is never checked for exits. Entry signals while Long
//! and Exit signals while Flat are ignored. A position still open after the
//! last bar is reported as an open trade valued at the last close.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    simple_return, Bar, ExitReason, PriceSeries, SeriesError, Signal, SignalSeries, Trade,
};

/// Exit conditions applied on top of the signal series.
///
/// Volatility levels (`stop_loss_multiplier`, `take_profit_multiplier`) are
/// measured in units of the volatility series passed to `simulate`, taken at
/// the entry bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitRules {
    pub stop_loss_multiplier: Option<f64>,
    pub take_profit_multiplier: Option<f64>,
    pub max_hold_days: Option<u32>,
    /// Close any open position on the last bar.
    pub liquidate_at_end: bool,
}

impl ExitRules {
    /// Exits come only from Exit signals and end-of-series liquidation.
    pub fn signal_only() -> Self {
        Self {
            stop_loss_multiplier: None,
            take_profit_multiplier: None,
            max_hold_days: None,
            liquidate_at_end: true,
        }
    }

    /// No forced exits at all; an open position survives the series end.
    pub fn hold_to_end() -> Self {
        Self {
            liquidate_at_end: false,
            ..Self::signal_only()
        }
    }
}

impl Default for ExitRules {
    fn default() -> Self {
        Self::signal_only()
    }
}

struct OpenPosition {
    entry_index: usize,
    entry_date: NaiveDate,
    entry_price: f64,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}

impl OpenPosition {
    fn open(index: usize, bar: &Bar, rules: &ExitRules, volatility: Option<&[f64]>) -> Self {
        let entry_price = bar.close;
        let vol = volatility
            .and_then(|v| v.get(index).copied())
            .filter(|v| v.is_finite());

        let (stop_loss, take_profit) = match vol {
            Some(vol) => (
                rules.stop_loss_multiplier.map(|k| entry_price - k * vol),
                rules.take_profit_multiplier.map(|k| entry_price + k * vol),
            ),
            None => (None, None),
        };

        Self {
            entry_index: index,
            entry_date: bar.date,
            entry_price,
            stop_loss,
            take_profit,
        }
    }

    /// First matching exit condition at bar `index`, if any.
    fn exit_reason(
        &self,
        index: usize,
        bar: &Bar,
        signal: Signal,
        rules: &ExitRules,
        is_last: bool,
    ) -> Option<ExitReason> {
        debug_assert!(index > self.entry_index);

        if self.stop_loss.is_some_and(|stop| bar.close < stop) {
            return Some(ExitReason::StopLoss);
        }
        if self.take_profit.is_some_and(|target| bar.close > target) {
            return Some(ExitReason::TakeProfit);
        }
        if let Some(max_days) = rules.max_hold_days {
            if (bar.date - self.entry_date).num_days() >= i64::from(max_days) {
                return Some(ExitReason::TimeStop);
            }
        }
        if signal == Signal::Exit {
            return Some(ExitReason::SignalReversal);
        }
        if is_last && rules.liquidate_at_end {
            return Some(ExitReason::ForceClose);
        }
        None
    }

    fn close(self, index: usize, bar: &Bar, reason: ExitReason) -> Trade {
        Trade {
            entry_index: self.entry_index,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            exit_index: Some(index),
            exit_date: Some(bar.date),
            exit_price: Some(bar.close),
            exit_reason: reason,
            realized_return: Some(simple_return(self.entry_price, bar.close)),
            unrealized_return: None,
        }
    }

    /// Report the position as still open, marked at `last`.
    fn mark(self, last: &Bar) -> Trade {
        Trade {
            entry_index: self.entry_index,
            entry_date: self.entry_date,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            exit_index: None,
            exit_date: None,
            exit_price: Some(last.close),
            exit_reason: ExitReason::Open,
            realized_return: None,
            unrealized_return: Some(simple_return(self.entry_price, last.close)),
        }
    }
}

/// Walk `series` bar by bar, turning signals into trades.
///
/// `volatility`, when given, must be aligned with the series; a NaN value at
/// the entry bar leaves that trade without stop/target levels.
pub fn simulate(
    series: &PriceSeries,
    signals: &SignalSeries,
    rules: &ExitRules,
    volatility: Option<&[f64]>,
) -> Result<Vec<Trade>, SeriesError> {
    let bars = series.bars();
    let n = bars.len();

    if signals.len() != n {
        return Err(SeriesError::LengthMismatch {
            what: "signals",
            expected: n,
            actual: signals.len(),
        });
    }
    if let Some(vol) = volatility {
        if vol.len() != n {
            return Err(SeriesError::LengthMismatch {
                what: "volatility",
                expected: n,
                actual: vol.len(),
            });
        }
    }

    let mut trades = Vec::new();
    let mut position: Option<OpenPosition> = None;

    for (i, bar) in bars.iter().enumerate() {
        let signal = signals.get(i);

        match position.take() {
            None => {
                if signal == Signal::Enter {
                    let pos = OpenPosition::open(i, bar, rules, volatility);
                    debug!(
                        bar = i,
                        date = %bar.date,
                        price = pos.entry_price,
                        stop_loss = ?pos.stop_loss,
                        take_profit = ?pos.take_profit,
                        "enter long"
                    );
                    position = Some(pos);
                }
            }
            Some(pos) => match pos.exit_reason(i, bar, signal, rules, i + 1 == n) {
                Some(reason) => {
                    let trade = pos.close(i, bar, reason);
                    debug!(
                        bar = i,
                        date = %bar.date,
                        price = bar.close,
                        reason = %reason,
                        ret = ?trade.realized_return,
                        "exit long"
                    );
                    trades.push(trade);
                }
                None => position = Some(pos),
            },
        }
    }

    if let Some(pos) = position {
        let last = series.last();
        debug!(entry_bar = pos.entry_index, "position open at end of series");
        trades.push(pos.mark(last));
    }

    Ok(trades)
}
