//! Trade: a closed position, appended once to the trade log.

use super::position::{PositionId, Side};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    /// Forced liquidation at the last bar of the run.
    EndOfData,
}

/// A complete round trip: every position field plus the exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub id: PositionId,
    pub side: Side,
    pub entry_time: NaiveDateTime,
    pub entry_index: usize,
    pub entry_price: f64,
    pub size: f64,
    pub entry_atr: f64,
    pub confidence: f64,
    pub volatility_ratio: f64,
    pub margin: f64,

    // ── Exit ──
    pub exit_time: NaiveDateTime,
    pub exit_index: usize,
    pub exit_price: f64,

    // ── PnL ──
    /// Price-difference form.
    pub pnl_points: f64,
    /// Currency form: `pnl_points * size`.
    pub pnl: f64,

    pub holding_bars: usize,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}
