//! Target labels: encoding between trading and model label spaces, and
//! TP/SL horizon labelling.
//!
//! Trading labels are -1 / 0 / 1 ([`Direction`]); classifiers work with the
//! contiguous model labels 0 / 1 / 2.

use hedgelab_core::domain::{Bar, Direction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("unknown model label {0} (expected 0, 1 or 2)")]
    UnknownModelLabel(u8),
}

/// Trading label to model label: -1 → 0, 0 → 1, 1 → 2.
pub fn encode(direction: Direction) -> u8 {
    match direction {
        Direction::Short => 0,
        Direction::Flat => 1,
        Direction::Long => 2,
    }
}

/// Model label to trading label: 0 → -1, 1 → 0, 2 → 1.
pub fn decode(label: u8) -> Result<Direction, LabelError> {
    match label {
        0 => Ok(Direction::Short),
        1 => Ok(Direction::Flat),
        2 => Ok(Direction::Long),
        other => Err(LabelError::UnknownModelLabel(other)),
    }
}

pub fn encode_all(directions: &[Direction]) -> Vec<u8> {
    directions.iter().copied().map(encode).collect()
}

pub fn decode_all(labels: &[u8]) -> Result<Vec<Direction>, LabelError> {
    labels.iter().copied().map(decode).collect()
}

/// Label each bar by which ATR barrier the next `horizon` bars reach.
///
/// `Long` when the highest high of bars `i+1..=i+horizon` reaches
/// `close + tp_mult * atr`, `Short` when the lowest low reaches
/// `close - sl_mult * atr`. A stop-loss touch overrides a take-profit touch.
/// Bars without a full future window, or with a NaN ATR, are `Flat`.
pub fn tp_sl_target(bars: &[Bar], horizon: usize, tp_mult: f64, sl_mult: f64) -> Vec<Direction> {
    let n = bars.len();
    (0..n)
        .map(|i| {
            if horizon == 0 || i + horizon >= n {
                return Direction::Flat;
            }
            let window = &bars[i + 1..=i + horizon];
            let future_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let future_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

            let bar = &bars[i];
            let tp = bar.close + bar.atr * tp_mult;
            let sl = bar.close - bar.atr * sl_mult;
            if future_low <= sl {
                Direction::Short
            } else if future_high >= tp {
                Direction::Long
            } else {
                Direction::Flat
            }
        })
        .collect()
}

/// Parameters of [`tp_sl_target`], as carried in run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSpec {
    /// Bars to look ahead.
    pub horizon: usize,
    pub tp_mult: f64,
    pub sl_mult: f64,
}

impl Default for LabelSpec {
    fn default() -> Self {
        Self {
            horizon: 20,
            tp_mult: 2.0,
            sl_mult: 2.0,
        }
    }
}

impl LabelSpec {
    pub fn apply(&self, bars: &[Bar]) -> Vec<Direction> {
        tp_sl_target(bars, self.horizon, self.tp_mult, self.sl_mult)
    }
}
