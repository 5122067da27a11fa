//! Simulation outputs and open-step diagnostics.

use crate::domain::{EquityPoint, Trade};
use serde::{Deserialize, Serialize};

/// Why the open step declined to open a position on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoSignal,
    LowConfidence,
    InvalidAtr,
    LowVolatility,
    MarginLimit,
}

/// Per-reason tallies of declined opens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRejections {
    pub no_signal: usize,
    pub low_confidence: usize,
    pub invalid_atr: usize,
    pub low_volatility: usize,
    pub margin_limit: usize,
}

impl OpenRejections {
    pub fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::NoSignal => self.no_signal += 1,
            RejectReason::LowConfidence => self.low_confidence += 1,
            RejectReason::InvalidAtr => self.invalid_atr += 1,
            RejectReason::LowVolatility => self.low_volatility += 1,
            RejectReason::MarginLimit => self.margin_limit += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.no_signal + self.low_confidence + self.invalid_atr + self.low_volatility + self.margin_limit
    }
}

/// Everything a simulation run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub initial_balance: f64,
    pub final_balance: f64,
    /// One point per bar: the seed for bar 0, then one after each processed bar.
    pub equity_curve: Vec<EquityPoint>,
    /// Closed trades in exit order.
    pub trades: Vec<Trade>,
    /// Margin still booked after end-of-data liquidation, which does not release it.
    pub residual_margin: f64,
    pub rejections: OpenRejections,
}

impl SimulationResult {
    pub fn net_pnl(&self) -> f64 {
        self.final_balance - self.initial_balance
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_tally() {
        let mut r = OpenRejections::default();
        r.record(RejectReason::NoSignal);
        r.record(RejectReason::NoSignal);
        r.record(RejectReason::MarginLimit);
        assert_eq!(r.no_signal, 2);
        assert_eq!(r.margin_limit, 1);
        assert_eq!(r.total(), 3);
    }
}
