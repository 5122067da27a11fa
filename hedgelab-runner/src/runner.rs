//! Stand-alone backtest: train on a prefix of the table, predict the rest,
//! and run the hedging simulator over the predicted segment.

use hedgelab_core::domain::{Direction, Signal};
use hedgelab_core::engine::{simulate, ConfigError, SimulationConfig, SimulationError, SimulationResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{predict_signals, ModelError, Trainer};
use crate::metrics::{BacktestSummary, ClassificationReport};
use crate::table::{FeatureTable, TableError};

/// Current schema version for persisted backtest artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("table error: {0}")]
    Table(#[from] TableError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
    #[error("train ratio {ratio} leaves {train_rows} training and {test_rows} test rows")]
    EmptySegment {
        ratio: f64,
        train_rows: usize,
        test_rows: usize,
    },
}

/// Complete result of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRun {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub dataset_hash: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub config: SimulationConfig,
    pub signals: Vec<Signal>,
    pub result: SimulationResult,
    pub summary: BacktestSummary,
    /// Predicted versus actual labels on the test segment.
    pub classification: ClassificationReport,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Train on the first `floor(n * train_ratio)` rows and simulate the rest.
pub fn run_backtest<T: Trainer>(
    table: &FeatureTable,
    trainer: &T,
    train_ratio: f64,
    config: &SimulationConfig,
) -> Result<BacktestRun, RunError> {
    config.validate()?;
    table.validate()?;

    let n = table.len();
    let split = (n as f64 * train_ratio.clamp(0.0, 1.0)).floor() as usize;
    if split == 0 || split >= n {
        return Err(RunError::EmptySegment {
            ratio: train_ratio,
            train_rows: split,
            test_rows: n.saturating_sub(split),
        });
    }

    let train = table.slice(0..split)?;
    let test = table.slice(split..n)?;
    tracing::info!(train_rows = train.len(), test_rows = test.len(), "training model");
    let model = trainer.train(&train)?;

    let signals = predict_signals(&model, test.features())?;
    let result = simulate(test.bars(), &signals, config)?;
    let summary = BacktestSummary::compute(&result);

    let predicted: Vec<Direction> = signals.iter().map(|s| s.direction).collect();
    let classification = ClassificationReport::compute(&predicted, test.targets());

    tracing::info!(
        trades = summary.total_trades,
        net_pnl = summary.net_pnl,
        profit_factor = summary.profit_factor,
        "backtest complete"
    );

    Ok(BacktestRun {
        schema_version: SCHEMA_VERSION,
        dataset_hash: table.dataset_hash(),
        train_rows: train.len(),
        test_rows: test.len(),
        config: config.clone(),
        signals,
        result,
        summary,
        classification,
    })
}

/// Fit on the whole table and score the model against its own targets.
pub fn evaluate_in_sample<T: Trainer>(
    table: &FeatureTable,
    trainer: &T,
) -> Result<ClassificationReport, RunError> {
    table.validate()?;
    let model = trainer.train(table)?;
    let signals = predict_signals(&model, table.features())?;
    let predicted: Vec<Direction> = signals.iter().map(|s| s.direction).collect();
    Ok(ClassificationReport::compute(&predicted, table.targets()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{synthetic_table, SyntheticOptions};
    use crate::model::NearestCentroidTrainer;

    fn table() -> FeatureTable {
        synthetic_table(&SyntheticOptions {
            rows: 400,
            ..SyntheticOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn splits_and_simulates_test_segment() {
        let t = table();
        let run = run_backtest(
            &t,
            &NearestCentroidTrainer::default(),
            0.75,
            &SimulationConfig::default(),
        )
        .unwrap();
        assert_eq!(run.train_rows, 300);
        assert_eq!(run.test_rows, 100);
        assert_eq!(run.signals.len(), 100);
        assert_eq!(run.result.equity_curve.len(), 100);
        assert_eq!(run.summary.total_trades, run.result.trades.len());
        let support: usize = run.classification.classes.values().map(|c| c.support).sum();
        assert_eq!(support, 100);
    }

    #[test]
    fn degenerate_split_is_an_error() {
        let t = table();
        for ratio in [0.0, 1.0] {
            assert!(matches!(
                run_backtest(&t, &NearestCentroidTrainer::default(), ratio, &SimulationConfig::default()),
                Err(RunError::EmptySegment { .. })
            ));
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_training() {
        let config = SimulationConfig {
            leverage: 0.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            run_backtest(&table(), &NearestCentroidTrainer::default(), 0.5, &config),
            Err(RunError::Config(_))
        ));
    }

    #[test]
    fn in_sample_report_covers_every_row() {
        let t = table();
        let report = evaluate_in_sample(&t, &NearestCentroidTrainer::default()).unwrap();
        let total: usize = report.confusion.iter().flatten().sum();
        assert_eq!(total, t.len());
        assert!((0.0..=1.0).contains(&report.accuracy));
    }
}
