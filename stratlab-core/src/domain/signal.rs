//! Per-bar trading signals.

use serde::{Deserialize, Serialize};

/// What a strategy says about a single bar.
///
/// Sign-encoded as +1 / -1 / 0 for interchange (`as_i8`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Enter,
    Exit,
    #[default]
    Hold,
}

impl Signal {
    pub fn as_i8(self) -> i8 {
        match self {
            Signal::Enter => 1,
            Signal::Exit => -1,
            Signal::Hold => 0,
        }
    }

    pub fn from_i8(v: i8) -> Self {
        match v.signum() {
            1 => Signal::Enter,
            -1 => Signal::Exit,
            _ => Signal::Hold,
        }
    }

    pub fn is_hold(self) -> bool {
        self == Signal::Hold
    }
}

/// One signal per bar, aligned with the price series it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalSeries(Vec<Signal>);

impl SignalSeries {
    /// All-Hold series of length `len`.
    pub fn hold(len: usize) -> Self {
        Self(vec![Signal::Hold; len])
    }

    /// Wrap raw signals. Bar 0 has no history, so it is forced to Hold.
    pub fn from_vec(mut signals: Vec<Signal>) -> Self {
        if let Some(first) = signals.first_mut() {
            *first = Signal::Hold;
        }
        Self(signals)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Signal {
        self.0.get(index).copied().unwrap_or_default()
    }

    pub fn as_slice(&self) -> &[Signal] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Signal> + '_ {
        self.0.iter().copied()
    }

    pub fn count(&self, signal: Signal) -> usize {
        self.0.iter().filter(|&&s| s == signal).count()
    }

    /// Indices and values of every non-Hold bar.
    pub fn events(&self) -> impl Iterator<Item = (usize, Signal)> + '_ {
        self.iter().enumerate().filter(|(_, s)| !s.is_hold())
    }

    pub fn to_i8(&self) -> Vec<i8> {
        self.iter().map(Signal::as_i8).collect()
    }
}
