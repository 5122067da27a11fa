//! Scoring primitives: pure functions over trade lists, equity curves and
//! label vectors.
//!
//! No dependencies on walk-forward orchestration or I/O.

use std::collections::BTreeMap;

use hedgelab_core::domain::equity::balances;
use hedgelab_core::domain::{Direction, Side, Signal, Trade};
use hedgelab_core::engine::SimulationResult;
use serde::{Deserialize, Serialize};

/// Profit factor reported when a trade list has no losing trades.
pub const PROFIT_FACTOR_SENTINEL: f64 = 10.0;

// ─── Trading metrics ────────────────────────────────────────────────

/// Gross profit over absolute gross loss.
///
/// 0.0 for an empty trade list, [`PROFIT_FACTOR_SENTINEL`] when gross loss is
/// exactly zero.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl).sum();

    if gross_loss == 0.0 {
        return PROFIT_FACTOR_SENTINEL;
    }
    gross_profit / gross_loss.abs()
}

/// Fraction of trades with positive pnl.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Largest peak-to-trough decline of a balance series, as a negative fraction.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

// ─── Classification metrics ─────────────────────────────────────────

/// Fraction of positions where prediction equals truth. 0.0 when empty.
pub fn accuracy(predicted: &[Direction], actual: &[Direction]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let hits = predicted.iter().zip(actual).filter(|(p, a)| p == a).count();
    hits as f64 / n as f64
}

fn true_positives(predicted: &[Direction], actual: &[Direction], class: Direction) -> usize {
    predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| **p == class && **a == class)
        .count()
}

/// tp / (tp + fp) for `class`; 0.0 when the class is never predicted.
pub fn precision(predicted: &[Direction], actual: &[Direction], class: Direction) -> f64 {
    let tp = true_positives(predicted, actual, class);
    let predicted_positive = predicted
        .iter()
        .zip(actual)
        .filter(|(p, _)| **p == class)
        .count();
    if predicted_positive == 0 {
        return 0.0;
    }
    tp as f64 / predicted_positive as f64
}

/// tp / (tp + fn) for `class`; 0.0 when the class never occurs.
pub fn recall(predicted: &[Direction], actual: &[Direction], class: Direction) -> f64 {
    let tp = true_positives(predicted, actual, class);
    let actual_positive = predicted
        .iter()
        .zip(actual)
        .filter(|(_, a)| **a == class)
        .count();
    if actual_positive == 0 {
        return 0.0;
    }
    tp as f64 / actual_positive as f64
}

/// Harmonic mean of precision and recall; 0.0 when both are zero.
pub fn f1(predicted: &[Direction], actual: &[Direction], class: Direction) -> f64 {
    let p = precision(predicted, actual, class);
    let r = recall(predicted, actual, class);
    if p + r == 0.0 {
        return 0.0;
    }
    2.0 * p * r / (p + r)
}

/// 3×3 counts; rows are true classes and columns predicted classes, both in
/// [`Direction::ALL`] order (-1, 0, 1).
pub fn confusion_matrix(predicted: &[Direction], actual: &[Direction]) -> [[usize; 3]; 3] {
    let mut matrix = [[0usize; 3]; 3];
    for (p, a) in predicted.iter().zip(actual) {
        matrix[class_index(*a)][class_index(*p)] += 1;
    }
    matrix
}

fn class_index(direction: Direction) -> usize {
    match direction {
        Direction::Short => 0,
        Direction::Flat => 1,
        Direction::Long => 2,
    }
}

/// Per-class precision/recall/F1 for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Accuracy, per-class scores and confusion matrix for one prediction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    /// Keyed by trading label ("-1", "0", "1").
    pub classes: BTreeMap<String, ClassScores>,
    pub confusion: [[usize; 3]; 3],
}

impl ClassificationReport {
    pub fn compute(predicted: &[Direction], actual: &[Direction]) -> Self {
        let classes = Direction::ALL
            .iter()
            .map(|&class| {
                let scores = ClassScores {
                    precision: precision(predicted, actual, class),
                    recall: recall(predicted, actual, class),
                    f1: f1(predicted, actual, class),
                    support: actual.iter().filter(|a| **a == class).count(),
                };
                (class.to_string(), scores)
            })
            .collect();
        Self {
            accuracy: accuracy(predicted, actual),
            classes,
            confusion: confusion_matrix(predicted, actual),
        }
    }
}

// ─── Fold diagnostics ───────────────────────────────────────────────

/// Occurrences of each trading label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    #[serde(rename = "-1")]
    pub short: usize,
    #[serde(rename = "0")]
    pub flat: usize,
    #[serde(rename = "1")]
    pub long: usize,
}

impl ClassCounts {
    pub fn from_directions(directions: impl IntoIterator<Item = Direction>) -> Self {
        let mut counts = Self::default();
        for d in directions {
            counts.add(d);
        }
        counts
    }

    pub fn add(&mut self, direction: Direction) {
        match direction {
            Direction::Short => self.short += 1,
            Direction::Flat => self.flat += 1,
            Direction::Long => self.long += 1,
        }
    }

    pub fn get(&self, direction: Direction) -> usize {
        match direction {
            Direction::Short => self.short,
            Direction::Flat => self.flat,
            Direction::Long => self.long,
        }
    }

    pub fn total(&self) -> usize {
        self.short + self.flat + self.long
    }

    /// Per-class count of positions where prediction and truth agree.
    pub fn correct(predicted: &[Direction], actual: &[Direction]) -> Self {
        Self::from_directions(
            predicted
                .iter()
                .zip(actual)
                .filter(|(p, a)| p == a)
                .map(|(p, _)| *p),
        )
    }
}

/// Mean/max/min of the winning-class probability over a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

impl ConfidenceStats {
    /// All zeros for an empty signal list.
    pub fn from_signals(signals: &[Signal]) -> Self {
        if signals.is_empty() {
            return Self::default();
        }
        let confidences: Vec<f64> = signals.iter().map(|s| s.confidence).collect();
        Self {
            mean: mean_f64(&confidences),
            max: confidences.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: confidences.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

// ─── Backtest summary ───────────────────────────────────────────────

/// Headline statistics of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub net_pnl: f64,
    pub return_pct: f64,
    pub total_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub long_winners: usize,
    pub short_winners: usize,
    pub wins: usize,
    pub losses: usize,
    pub avg_holding_bars: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub residual_margin: f64,
}

impl BacktestSummary {
    pub fn compute(result: &SimulationResult) -> Self {
        let trades = &result.trades;
        let count_side = |side: Side| trades.iter().filter(|t| t.side == side).count();
        let winners_side = |side: Side| {
            trades
                .iter()
                .filter(|t| t.side == side && t.is_winner())
                .count()
        };
        let holding: Vec<f64> = trades.iter().map(|t| t.holding_bars as f64).collect();
        let net_pnl = result.net_pnl();
        let return_pct = if result.initial_balance != 0.0 {
            net_pnl / result.initial_balance * 100.0
        } else {
            0.0
        };

        Self {
            initial_balance: result.initial_balance,
            final_balance: result.final_balance,
            net_pnl,
            return_pct,
            total_trades: trades.len(),
            long_trades: count_side(Side::Long),
            short_trades: count_side(Side::Short),
            long_winners: winners_side(Side::Long),
            short_winners: winners_side(Side::Short),
            wins: trades.iter().filter(|t| t.is_winner()).count(),
            losses: trades.iter().filter(|t| t.is_loser()).count(),
            avg_holding_bars: mean_f64(&holding),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            max_drawdown: max_drawdown(&balances(&result.equity_curve)),
            residual_margin: result.residual_margin,
        }
    }
}
