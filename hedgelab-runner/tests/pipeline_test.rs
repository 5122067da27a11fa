//! End-to-end: synthetic data → random search → best params → backtest → artifacts.

use hedgelab_runner::config::RunConfig;
use hedgelab_runner::data_loader::{synthetic_table, SyntheticOptions};
use hedgelab_runner::fitness::FitnessWeights;
use hedgelab_runner::history::TrialHistory;
use hedgelab_runner::labels::LabelSpec;
use hedgelab_runner::model::{NearestCentroidParams, NearestCentroidTrainer};
use hedgelab_runner::optimize::{run_random_search, OptimizeConfig, SearchSpace, TrialParams};
use hedgelab_runner::params::BestParams;
use hedgelab_runner::reporting::{import_backtest_json, write_backtest_artifacts};
use hedgelab_runner::runner::run_backtest;
use hedgelab_runner::table::FeatureTable;
use hedgelab_runner::walk_forward::{run_walk_forward, WalkForwardConfig, WalkForwardResult};

fn base_table() -> FeatureTable {
    synthetic_table(&SyntheticOptions {
        rows: 1200,
        seed: 5,
        ..SyntheticOptions::default()
    })
    .unwrap()
}

fn objective<'a>(
    table: &'a FeatureTable,
    config: &'a WalkForwardConfig,
) -> impl FnMut(&TrialParams) -> anyhow::Result<WalkForwardResult> + 'a {
    move |params| {
        let best = params.to_best_params("nearest_centroid");
        let labels: LabelSpec = best.indicators_as()?;
        let model: NearestCentroidParams = best.model_params_as()?;
        let relabelled = table.with_targets(labels.apply(table.bars()))?;
        Ok(run_walk_forward(
            &relabelled,
            &NearestCentroidTrainer::new(model),
            config,
        )?)
    }
}

#[test]
fn search_persist_and_backtest() {
    let dir = tempfile::tempdir().unwrap();
    let table = base_table();
    let wf = WalkForwardConfig {
        step: 100,
        conf_threshold: 0.0,
        ..WalkForwardConfig::default()
    };
    let history = TrialHistory::new(dir.path().join("trials.jsonl"));

    let outcome = run_random_search(
        &SearchSpace::default(),
        &OptimizeConfig {
            n_trials: 4,
            seed: 3,
            ..OptimizeConfig::default()
        },
        &FitnessWeights::default(),
        Some(&history),
        objective(&table, &wf),
    )
    .unwrap();

    assert_eq!(outcome.trials_run, 4);
    let records = history.read_all().unwrap();
    assert_eq!(records.len(), 4);
    let best_on_file = history.best().unwrap().unwrap();
    assert_eq!(best_on_file.trial, outcome.best.trial);

    // Persist and reload the winning parameters.
    let params_path = dir.path().join("best_params.json");
    outcome.best_params.save(&params_path).unwrap();
    let loaded = BestParams::load_or_default(&params_path).unwrap();
    assert_eq!(loaded.model_name, outcome.best_params.model_name);
    assert!(loaded
        .indicators
        .keys()
        .eq(outcome.best_params.indicators.keys()));
    assert_eq!(loaded.indicators["horizon"], outcome.best_params.indicators["horizon"]);

    // Backtest with the reloaded parameters.
    let labels: LabelSpec = loaded.indicators_as().unwrap();
    let model: NearestCentroidParams = loaded.model_params_as().unwrap();
    let relabelled = table.with_targets(labels.apply(table.bars())).unwrap();
    let run = run_backtest(
        &relabelled,
        &NearestCentroidTrainer::new(model),
        0.7,
        &RunConfig::default().simulation,
    )
    .unwrap();
    assert_eq!(run.train_rows, 840);
    assert_eq!(run.result.equity_curve.len(), 360);

    let art_dir = write_backtest_artifacts(&run, dir.path()).unwrap();
    for file in ["manifest.json", "trades.csv", "equity.csv"] {
        assert!(art_dir.join(file).exists(), "missing {file}");
    }
    let manifest = std::fs::read_to_string(art_dir.join("manifest.json")).unwrap();
    let back = import_backtest_json(&manifest).unwrap();
    assert_eq!(back.summary.total_trades, run.summary.total_trades);
    assert_eq!(back.result.trades.len(), run.result.trades.len());
    assert!((back.summary.net_pnl - run.summary.net_pnl).abs() < 1e-9);

    let equity_rows = std::fs::read_to_string(art_dir.join("equity.csv"))
        .unwrap()
        .lines()
        .count();
    assert_eq!(equity_rows, 361);
}

#[test]
fn newer_manifest_schema_is_rejected() {
    let table = base_table();
    let run = run_backtest(
        &table,
        &NearestCentroidTrainer::default(),
        0.8,
        &RunConfig::default().simulation,
    )
    .unwrap();
    let mut json: serde_json::Value = serde_json::to_value(&run).unwrap();
    json["schema_version"] = serde_json::json!(99);
    assert!(import_backtest_json(&json.to_string()).is_err());
}
