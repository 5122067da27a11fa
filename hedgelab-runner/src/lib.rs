//! HedgeLab Runner: walk-forward evaluation and everything around it.
//!
//! This crate builds on `hedgelab-core` to provide:
//! - Labelled feature tables, loading (CSV/Parquet) and synthetic data
//! - Target encoding and TP/SL horizon labelling
//! - Classifier/trainer capabilities and a nearest-centroid reference model
//! - Walk-forward orchestration with an unseen holdout segment
//! - Scoring primitives, fitness blending and backtest summaries
//! - Random-search optimisation with JSONL trial history
//! - Run configuration, best-params persistence and report export

pub mod classifier;
pub mod config;
pub mod data_loader;
pub mod fitness;
pub mod history;
pub mod labels;
pub mod metrics;
pub mod model;
pub mod optimize;
pub mod params;
pub mod reporting;
pub mod runner;
pub mod table;
pub mod walk_forward;

pub use classifier::{predict_signals, Classifier, ModelError, Trainer};
pub use config::{OptimizeSection, RunConfig, RunConfigError};
pub use data_loader::{load_table, synthetic_table, LoadError, LoadOptions, SyntheticOptions};
pub use fitness::FitnessWeights;
pub use history::{TrialHistory, TrialRecord};
pub use labels::{tp_sl_target, LabelError, LabelSpec};
pub use metrics::{
    profit_factor, BacktestSummary, ClassCounts, ClassificationReport, ConfidenceStats,
    PROFIT_FACTOR_SENTINEL,
};
pub use model::{NearestCentroid, NearestCentroidParams, NearestCentroidTrainer};
pub use optimize::{
    run_random_search, OptimizeConfig, OptimizeError, OptimizeOutcome, ParamRange, SearchSpace,
    TrialParams,
};
pub use params::{BestParams, ParamsError};
pub use runner::{evaluate_in_sample, run_backtest, BacktestRun, RunError};
pub use table::{FeatureTable, TableError};
pub use walk_forward::{
    create_folds, run_walk_forward, unseen_segment, FoldRecord, FoldSpec, FoldStatus,
    SegmentKind, WalkForwardConfig, WalkForwardError, WalkForwardResult,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn fold_inputs_are_shareable() {
        assert_sync::<FeatureTable>();
        assert_sync::<WalkForwardConfig>();
        assert_sync::<NearestCentroidTrainer>();
        assert_send::<NearestCentroid>();
        assert_sync::<NearestCentroid>();
    }

    #[test]
    fn fold_outputs_are_send() {
        assert_send::<FoldRecord>();
        assert_send::<WalkForwardResult>();
        assert_send::<TrialRecord>();
        assert_send::<BacktestRun>();
    }
}
