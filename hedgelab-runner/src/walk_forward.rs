//! Walk-forward evaluation: expanding-window folds plus an unseen holdout.
//!
//! Folds start at `floor(n * train_ratio)` and advance by `step` rows. Each
//! fold trains a fresh model on every row before its test window, predicts
//! the window, and simulates it with the evaluation preset; the fold score is
//! the profit factor of the resulting trades. The tail beyond
//! `floor(n * (1 - unseen_ratio))` is scored once more as an unseen segment.
//!
//! A failing fold scores 0.0 and is still reported, so the fold list length
//! depends only on the table length and the configuration.

use std::ops::Range;

use hedgelab_core::domain::{Direction, Signal};
use hedgelab_core::engine::{simulate, SimulationConfig, SimulationError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{predict_signals, ModelError, Trainer};
use crate::metrics::{mean_f64, profit_factor, ClassCounts, ConfidenceStats};
use crate::table::{FeatureTable, TableError};

// ─── Configuration ───────────────────────────────────────────────────

/// Configuration for walk-forward evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Fraction of rows before the first fold's test window (default 0.7).
    pub train_ratio: f64,
    /// Rows per test window (default 200).
    pub step: usize,
    /// Fraction of rows held back as the unseen segment (default 0.1).
    pub unseen_ratio: f64,
    /// Minimum confidence to open a position while scoring.
    pub conf_threshold: f64,
    /// Minimum ATR/close to open a position while scoring.
    pub vol_ratio_threshold: f64,
    /// Simulation preset; its thresholds are replaced by the two above.
    pub simulation: SimulationConfig,
    /// Evaluate folds on the rayon pool.
    pub parallel: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.7,
            step: 200,
            unseen_ratio: 0.1,
            conf_threshold: 0.55,
            vol_ratio_threshold: 0.0,
            simulation: SimulationConfig::evaluation(),
            parallel: false,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), WalkForwardError> {
        if self.step == 0 {
            return Err(WalkForwardError::ZeroStep);
        }
        for (name, value) in [
            ("train_ratio", self.train_ratio),
            ("unseen_ratio", self.unseen_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(WalkForwardError::RatioOutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// Simulation parameters used for every scored segment.
    pub fn scoring_config(&self) -> SimulationConfig {
        self.simulation
            .with_thresholds(self.conf_threshold, self.vol_ratio_threshold)
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Which part of the series a segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Fold,
    Unseen,
}

/// Row bounds of one scored segment. Training always starts at row 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSpec {
    pub fold_index: usize,
    pub kind: SegmentKind,
    /// Training rows are `[0, train_end)`.
    pub train_end: usize,
    /// Test start row (inclusive); equals `train_end`.
    pub test_start: usize,
    /// Test end row (exclusive).
    pub test_end: usize,
}

impl FoldSpec {
    pub fn train_rows(&self) -> Range<usize> {
        0..self.train_end
    }

    pub fn test_rows(&self) -> Range<usize> {
        self.test_start..self.test_end
    }
}

/// Outcome of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FoldStatus {
    Evaluated,
    Failed { reason: String },
}

/// Diagnostics for one scored segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldRecord {
    #[serde(flatten)]
    pub spec: FoldSpec,
    #[serde(flatten)]
    pub status: FoldStatus,
    /// Profit factor; 0.0 when the segment failed.
    pub score: f64,
    pub trade_count: usize,
    pub predicted: ClassCounts,
    pub actual: ClassCounts,
    /// Per-class count of rows where prediction matched the target.
    pub correct: ClassCounts,
    pub confidence: ConfidenceStats,
}

impl FoldRecord {
    fn failed(spec: FoldSpec, reason: String) -> Self {
        Self {
            spec,
            status: FoldStatus::Failed { reason },
            score: 0.0,
            trade_count: 0,
            predicted: ClassCounts::default(),
            actual: ClassCounts::default(),
            correct: ClassCounts::default(),
            confidence: ConfidenceStats::default(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FoldStatus::Failed { .. })
    }
}

/// Complete result of walk-forward evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    /// Mean fold score; 0.0 without folds.
    pub walk_forward_score: f64,
    /// Unseen segment score; 0.0 when degenerate or failed.
    pub unseen_score: f64,
    /// One record per fold, in fold order.
    pub folds: Vec<FoldRecord>,
    /// Unseen segment record; `None` when the segment is degenerate.
    pub unseen: Option<FoldRecord>,
}

impl WalkForwardResult {
    fn empty() -> Self {
        Self {
            walk_forward_score: 0.0,
            unseen_score: 0.0,
            folds: Vec::new(),
            unseen: None,
        }
    }

    pub fn fold_scores(&self) -> Vec<f64> {
        self.folds.iter().map(|f| f.score).collect()
    }

    pub fn failed_folds(&self) -> usize {
        self.folds.iter().filter(|f| f.is_failed()).count()
    }
}

/// Systemic problems that prevent evaluation altogether.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("step must be at least 1")]
    ZeroStep,
    #[error("{name} must lie in [0, 1], got {value}")]
    RatioOutOfRange { name: &'static str, value: f64 },
    #[error("invalid feature table: {0}")]
    Table(#[from] TableError),
}

/// Why a single segment could not be scored.
#[derive(Debug, Error)]
pub enum FoldError {
    #[error("slice: {0}")]
    Table(#[from] TableError),
    #[error("model: {0}")]
    Model(#[from] ModelError),
    #[error("simulation: {0}")]
    Simulation(#[from] SimulationError),
}

// ─── Fold creation ───────────────────────────────────────────────────

/// Fewer than two test windows of rows. Saturates for huge steps.
fn too_short(n: usize, step: usize) -> bool {
    step.checked_mul(2).map_or(true, |min_rows| n < min_rows)
}

/// First training boundary and unseen start for `n` rows.
fn boundaries(n: usize, config: &WalkForwardConfig) -> (usize, usize) {
    let start_train = (n as f64 * config.train_ratio).floor() as usize;
    let unseen_start = (n as f64 * (1.0 - config.unseen_ratio)).floor() as usize;
    (start_train, unseen_start)
}

/// Fold specifications for `n` rows.
///
/// Test windows start at `start_train, start_train + step, …` while the
/// start stays below `unseen_start - step`. Empty when `n < 2 * step`.
pub fn create_folds(n: usize, config: &WalkForwardConfig) -> Vec<FoldSpec> {
    if config.step == 0 || too_short(n, config.step) {
        return Vec::new();
    }
    let (start_train, unseen_start) = boundaries(n, config);
    (start_train..unseen_start.saturating_sub(config.step))
        .step_by(config.step)
        .enumerate()
        .map(|(fold_index, start)| FoldSpec {
            fold_index,
            kind: SegmentKind::Fold,
            train_end: start,
            test_start: start,
            test_end: start + config.step,
        })
        .collect()
}

/// The unseen holdout for `n` rows, or `None` when it is degenerate.
pub fn unseen_segment(n: usize, config: &WalkForwardConfig) -> Option<FoldSpec> {
    if config.step == 0 || too_short(n, config.step) {
        return None;
    }
    let (start_train, unseen_start) = boundaries(n, config);
    if unseen_start <= start_train || unseen_start >= n - config.step {
        return None;
    }
    Some(FoldSpec {
        fold_index: create_folds(n, config).len(),
        kind: SegmentKind::Unseen,
        train_end: unseen_start,
        test_start: unseen_start,
        test_end: n,
    })
}

// ─── Walk-forward orchestration ──────────────────────────────────────

/// Run walk-forward evaluation of `trainer` over `table`.
pub fn run_walk_forward<T: Trainer>(
    table: &FeatureTable,
    trainer: &T,
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult, WalkForwardError> {
    config.validate()?;
    table.validate()?;

    let n = table.len();
    if too_short(n, config.step) {
        tracing::info!(rows = n, step = config.step, "series too short for walk-forward");
        return Ok(WalkForwardResult::empty());
    }

    let specs = create_folds(n, config);
    tracing::info!(
        rows = n,
        folds = specs.len(),
        parallel = config.parallel,
        "starting walk-forward"
    );

    let folds: Vec<FoldRecord> = if config.parallel {
        specs
            .into_par_iter()
            .map(|spec| score_segment(table, trainer, config, spec))
            .collect()
    } else {
        specs
            .into_iter()
            .map(|spec| score_segment(table, trainer, config, spec))
            .collect()
    };

    let scores: Vec<f64> = folds.iter().map(|f| f.score).collect();
    let walk_forward_score = mean_f64(&scores);

    let unseen =
        unseen_segment(n, config).map(|spec| score_segment(table, trainer, config, spec));
    let unseen_score = unseen.as_ref().map_or(0.0, |u| u.score);

    tracing::info!(
        walk_forward_score,
        unseen_score,
        failed = folds.iter().filter(|f| f.is_failed()).count(),
        "walk-forward complete"
    );

    Ok(WalkForwardResult {
        walk_forward_score,
        unseen_score,
        folds,
        unseen,
    })
}

/// Score one segment, converting any failure into a zero-score record.
fn score_segment<T: Trainer>(
    table: &FeatureTable,
    trainer: &T,
    config: &WalkForwardConfig,
    spec: FoldSpec,
) -> FoldRecord {
    match evaluate_segment(table, trainer, config, &spec) {
        Ok(record) => {
            tracing::debug!(
                fold = spec.fold_index,
                kind = ?spec.kind,
                score = record.score,
                trades = record.trade_count,
                "segment scored"
            );
            record
        }
        Err(err) => {
            tracing::warn!(
                fold = spec.fold_index,
                kind = ?spec.kind,
                error = %err,
                "segment failed, scoring 0.0"
            );
            FoldRecord::failed(spec, err.to_string())
        }
    }
}

fn evaluate_segment<T: Trainer>(
    table: &FeatureTable,
    trainer: &T,
    config: &WalkForwardConfig,
    spec: &FoldSpec,
) -> Result<FoldRecord, FoldError> {
    let train = table.slice(spec.train_rows())?;
    let model = trainer.train(&train)?;

    let test = table.slice(spec.test_rows())?;
    let signals = predict_signals(&model, test.features())?;
    let predicted: Vec<Direction> = signals.iter().map(|s: &Signal| s.direction).collect();

    let result = simulate(test.bars(), &signals, &config.scoring_config())?;

    Ok(FoldRecord {
        spec: spec.clone(),
        status: FoldStatus::Evaluated,
        score: profit_factor(&result.trades),
        trade_count: result.trades.len(),
        predicted: ClassCounts::from_directions(predicted.iter().copied()),
        actual: ClassCounts::from_directions(test.targets().iter().copied()),
        correct: ClassCounts::correct(&predicted, test.targets()),
        confidence: ConfidenceStats::from_signals(&signals),
    })
}
