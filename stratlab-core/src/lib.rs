//! StratLab Core: indicators, strategies and the position simulator.
//!
//! This crate is the pure computational core of the backtester:
//! - Domain types (bars, validated price series, signals, trades)
//! - Indicator library (True Range, ATR, SMA, RSI, rolling extrema, SuperTrend)
//! - Strategy variants behind the `SignalGenerator` capability trait
//! - Flat/Long position simulator with prioritized exit rules
//!
//! No I/O happens here. Loading data, computing performance statistics and
//! writing artifacts live in `stratlab-runner`.

pub mod domain;
pub mod engine;
pub mod indicators;
pub mod strategy;
