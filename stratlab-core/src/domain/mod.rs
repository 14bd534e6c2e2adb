//! Domain types for StratLab

pub mod bar;
pub mod series;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use series::{PriceSeries, SeriesError};
pub use signal::{Signal, SignalSeries};
pub use trade::{simple_return, ExitReason, Trade};
