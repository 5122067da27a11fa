//! Open position held by the ledger between entry and exit.

use super::signal::Direction;
use super::trade::{ExitReason, Trade};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Monotonic position identifier, unique within one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

/// Side of an open position. Opposing sides are never netted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Side implied by a signal direction; `None` for flat.
    pub fn from_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Long => Some(Side::Long),
            Direction::Short => Some(Side::Short),
            Direction::Flat => None,
        }
    }

    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

/// A position opened at a bar close with fixed ATR-based exit levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub side: Side,
    pub entry_time: NaiveDateTime,
    pub entry_index: usize,
    pub entry_price: f64,
    pub size: f64,
    /// ATR at entry; SL/TP distances are multiples of it.
    pub entry_atr: f64,
    pub confidence: f64,
    pub volatility_ratio: f64,
    /// Margin reserved at entry, released exactly once on an SL/TP close.
    pub margin: f64,
}

impl Position {
    pub fn take_profit(&self, tp_mult: f64) -> f64 {
        self.entry_price + self.side.sign() * tp_mult * self.entry_atr
    }

    pub fn stop_loss(&self, sl_mult: f64) -> f64 {
        self.entry_price - self.side.sign() * sl_mult * self.entry_atr
    }

    /// Price difference gained by exiting at `exit_price`.
    pub fn pnl_points(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Long => exit_price - self.entry_price,
            Side::Short => self.entry_price - exit_price,
        }
    }

    /// Consume the position into an immutable trade record.
    pub fn close(
        self,
        exit_time: NaiveDateTime,
        exit_index: usize,
        exit_price: f64,
        holding_bars: usize,
        exit_reason: ExitReason,
    ) -> Trade {
        let pnl_points = self.pnl_points(exit_price);
        let pnl = pnl_points * self.size;
        Trade {
            id: self.id,
            side: self.side,
            entry_time: self.entry_time,
            entry_index: self.entry_index,
            entry_price: self.entry_price,
            size: self.size,
            entry_atr: self.entry_atr,
            confidence: self.confidence,
            volatility_ratio: self.volatility_ratio,
            margin: self.margin,
            exit_time,
            exit_index,
            exit_price,
            pnl_points,
            pnl,
            holding_bars,
            exit_reason,
        }
    }
}
