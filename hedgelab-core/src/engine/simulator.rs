//! Bar simulator: the hedging state machine.
//!
//! Three phases per bar i >= 1 (bar 0 only seeds the equity curve):
//! 1. Close check: SL/TP against the bar's high/low, take-profit first
//! 2. Open check: signal, confidence, ATR, volatility and margin gates
//! 3. Equity: record (timestamp, balance)
//!
//! After the last bar every remaining position is liquidated at the last
//! close without touching margin bookkeeping.

use crate::domain::{Bar, EquityPoint, ExitReason, Position, Side, Signal, Trade};
use thiserror::Error;

use super::config::SimulationConfig;
use super::ledger::PositionLedger;
use super::margin::MarginController;
use super::state::{OpenRejections, RejectReason, SimulationResult};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("signal series has {signals} entries but bar series has {bars}")]
    LengthMismatch { bars: usize, signals: usize },
}

/// Exit decision for `position` on `bar`, if any.
///
/// When the bar reaches both levels the take-profit wins.
pub fn resolve_exit(
    position: &Position,
    bar: &Bar,
    sl_mult: f64,
    tp_mult: f64,
) -> Option<(f64, ExitReason)> {
    let tp = position.take_profit(tp_mult);
    let sl = position.stop_loss(sl_mult);
    let (hit_tp, hit_sl) = match position.side {
        Side::Long => (bar.high >= tp, bar.low <= sl),
        Side::Short => (bar.low <= tp, bar.high >= sl),
    };
    if hit_tp {
        Some((tp, ExitReason::TakeProfit))
    } else if hit_sl {
        Some((sl, ExitReason::StopLoss))
    } else {
        None
    }
}

/// Mutable simulation state, advanced one bar at a time.
#[derive(Debug, Clone)]
pub struct BarSimulator {
    config: SimulationConfig,
    balance: f64,
    ledger: PositionLedger,
    margin: MarginController,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    rejections: OpenRejections,
}

impl BarSimulator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            config: config.clone(),
            balance: config.initial_balance,
            ledger: PositionLedger::new(),
            margin: MarginController::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            rejections: OpenRejections::default(),
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn used_margin(&self) -> f64 {
        self.margin.used()
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.ledger.iter()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Record the seed state for bar 0.
    pub fn seed(&mut self, bar: &Bar) {
        self.record_equity(bar);
    }

    /// Process bar `index` (>= 1) with its signal.
    pub fn step(&mut self, index: usize, bar: &Bar, signal: &Signal) {
        self.close_hits(index, bar);
        if let Err(reason) = self.try_open(index, bar, signal) {
            self.rejections.record(reason);
        }
        self.record_equity(bar);
    }

    /// Liquidate what is still open at `last_bar` and return the run output.
    pub fn finish(mut self, last_bar: &Bar, n_bars: usize) -> SimulationResult {
        let remaining = self.ledger.drain();
        if !remaining.is_empty() {
            tracing::debug!(
                count = remaining.len(),
                price = last_bar.close,
                "liquidating open positions at end of data"
            );
        }
        for position in remaining {
            let holding_bars = n_bars.saturating_sub(position.entry_index);
            let trade = position.close(
                last_bar.timestamp,
                n_bars.saturating_sub(1),
                last_bar.close,
                holding_bars,
                ExitReason::EndOfData,
            );
            self.balance += trade.pnl;
            self.trades.push(trade);
        }

        SimulationResult {
            initial_balance: self.config.initial_balance,
            final_balance: self.balance,
            equity_curve: self.equity_curve,
            trades: self.trades,
            residual_margin: self.margin.used(),
            rejections: self.rejections,
        }
    }

    fn finish_empty(self) -> SimulationResult {
        SimulationResult {
            initial_balance: self.config.initial_balance,
            final_balance: self.balance,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            residual_margin: 0.0,
            rejections: self.rejections,
        }
    }

    fn close_hits(&mut self, index: usize, bar: &Bar) {
        let (sl_mult, tp_mult) = (self.config.sl_mult, self.config.tp_mult);
        let closed = self
            .ledger
            .close_where(|position| resolve_exit(position, bar, sl_mult, tp_mult));

        for (position, (exit_price, reason)) in closed {
            let holding_bars = index - position.entry_index;
            self.margin.release(position.margin);
            let trade = position.close(bar.timestamp, index, exit_price, holding_bars, reason);
            self.balance += trade.pnl;
            self.trades.push(trade);
        }
    }

    fn try_open(&mut self, index: usize, bar: &Bar, signal: &Signal) -> Result<(), RejectReason> {
        let side = Side::from_direction(signal.direction).ok_or(RejectReason::NoSignal)?;
        if signal.confidence < self.config.conf_threshold {
            return Err(RejectReason::LowConfidence);
        }
        if !bar.has_usable_atr() {
            return Err(RejectReason::InvalidAtr);
        }
        let volatility_ratio = bar.volatility_ratio();
        if volatility_ratio < self.config.vol_ratio_threshold {
            return Err(RejectReason::LowVolatility);
        }

        let required = MarginController::required(
            bar.close,
            self.config.position_size,
            self.config.contract_size,
            self.config.leverage,
        );
        if !self
            .margin
            .admits(required, self.balance, self.config.margin_limit)
        {
            return Err(RejectReason::MarginLimit);
        }

        let position = Position {
            id: self.ledger.next_id(),
            side,
            entry_time: bar.timestamp,
            entry_index: index,
            entry_price: bar.close,
            size: self.config.position_size,
            entry_atr: bar.atr,
            confidence: signal.confidence,
            volatility_ratio,
            margin: required,
        };
        self.ledger.insert(position);
        self.margin.reserve(required);
        Ok(())
    }

    fn record_equity(&mut self, bar: &Bar) {
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            balance: self.balance,
        });
    }
}

/// Run a full simulation over `bars` with one signal per bar.
///
/// The signal for bar 0 is ignored: bar 0 only seeds the state.
pub fn simulate(
    bars: &[Bar],
    signals: &[Signal],
    config: &SimulationConfig,
) -> Result<SimulationResult, SimulationError> {
    if bars.len() != signals.len() {
        return Err(SimulationError::LengthMismatch {
            bars: bars.len(),
            signals: signals.len(),
        });
    }

    let mut sim = BarSimulator::new(config);
    let Some((first, rest)) = bars.split_first() else {
        return Ok(sim.finish_empty());
    };

    sim.seed(first);
    for (offset, (bar, signal)) in rest.iter().zip(&signals[1..]).enumerate() {
        sim.step(offset + 1, bar, signal);
    }

    let last = bars.last().unwrap_or(first);
    Ok(sim.finish(last, bars.len()))
}
