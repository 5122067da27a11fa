//! HedgeLab CLI: backtest, walk-forward, optimize and train commands.
//!
//! Commands:
//! - `backtest` - train on a prefix, simulate the rest, write artifacts
//! - `walk-forward` - rolling folds plus the unseen holdout segment
//! - `optimize` - seeded random search over labelling and model parameters
//! - `train` - in-sample classification report for the current parameters

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use hedgelab_core::domain::Direction;
use hedgelab_runner::params::DEFAULT_MODEL_NAME;
use hedgelab_runner::reporting::{
    format_summary, format_walk_forward, write_backtest_artifacts, write_walk_forward_json,
};
use hedgelab_runner::{
    evaluate_in_sample, load_table, run_backtest, run_random_search, run_walk_forward,
    synthetic_table, BestParams, FeatureTable, LabelSpec, LoadOptions, NearestCentroidParams,
    NearestCentroidTrainer, RunConfig, SyntheticOptions, TrialHistory, TrialRecord,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "hedgelab",
    about = "HedgeLab CLI: hedging backtests with walk-forward evaluation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// CSV or Parquet file with timestamp, OHLC, feature and target columns.
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Generate a seeded random-walk series instead of reading a file.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Rows of synthetic data.
    #[arg(long, default_value_t = 3000)]
    rows: usize,

    /// Seed for synthetic data.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// First synthetic bar date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// Run configuration (TOML). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optimised parameters (JSON). Missing file means defaults.
    #[arg(long, default_value = "best_params.json")]
    params: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on the first part of the data and backtest the remainder.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// Output directory for manifest, trades and equity files.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Run walk-forward folds and the unseen holdout.
    WalkForward {
        #[command(flatten)]
        data: DataArgs,

        /// Evaluate folds on the rayon pool.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Write the full result as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Random search over labelling and model parameters.
    Optimize {
        #[command(flatten)]
        data: DataArgs,

        /// Override the configured number of trials.
        #[arg(long)]
        trials: Option<usize>,

        /// Trial history (JSON lines), appended to.
        #[arg(long, default_value = "trials.jsonl")]
        history: PathBuf,
    },
    /// Fit on all rows and print the in-sample classification report.
    Train {
        #[command(flatten)]
        data: DataArgs,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to initialize tracing")
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest { data, output_dir } => run_backtest_cmd(&data, &output_dir),
        Commands::WalkForward {
            data,
            parallel,
            output,
        } => run_walk_forward_cmd(&data, parallel, output.as_deref()),
        Commands::Optimize {
            data,
            trials,
            history,
        } => run_optimize_cmd(&data, trials, &history),
        Commands::Train { data, json } => run_train_cmd(&data, json),
    }
}

// ─── Shared setup ───────────────────────────────────────────────────

/// Everything a command needs: validated config, parameters and the table
/// already labelled with the active label spec.
struct Session {
    config: RunConfig,
    params: BestParams,
    labels: LabelSpec,
    table: FeatureTable,
}

impl Session {
    fn open(args: &DataArgs) -> Result<Self> {
        let config = match &args.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        config.validate()?;

        let params = BestParams::load_or_default(&args.params)?;
        if params.model_name != DEFAULT_MODEL_NAME {
            bail!(
                "unsupported model '{}' in {} (expected '{DEFAULT_MODEL_NAME}')",
                params.model_name,
                args.params.display()
            );
        }
        let labels = if params.indicators.is_empty() {
            config.labels.clone()
        } else {
            params.indicators_as()?
        };

        let table = load_data(args, &labels)?;
        let table = if params.indicators.is_empty() {
            table
        } else {
            table.with_targets(labels.apply(table.bars()))?
        };
        tracing::info!(
            rows = table.len(),
            features = table.feature_names().len(),
            config_hash = %config.config_hash(),
            "data ready"
        );

        Ok(Self {
            config,
            params,
            labels,
            table,
        })
    }

    fn trainer(&self) -> Result<NearestCentroidTrainer> {
        let model: NearestCentroidParams = self.params.model_params_as()?;
        Ok(NearestCentroidTrainer::new(model))
    }
}

fn load_data(args: &DataArgs, labels: &LabelSpec) -> Result<FeatureTable> {
    match (&args.data, args.synthetic) {
        (Some(path), _) => {
            let opts = LoadOptions {
                labels: labels.clone(),
                ..LoadOptions::default()
            };
            load_table(path, &opts).with_context(|| format!("failed to load {}", path.display()))
        }
        (None, true) => {
            let mut opts = SyntheticOptions {
                rows: args.rows,
                seed: args.seed,
                labels: labels.clone(),
                ..SyntheticOptions::default()
            };
            if let Some(start) = &args.start {
                opts.start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
                    .with_context(|| format!("invalid --start date '{start}'"))?
                    .and_time(chrono::NaiveTime::MIN);
            }
            Ok(synthetic_table(&opts)?)
        }
        (None, false) => bail!("one of --data or --synthetic is required"),
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_backtest_cmd(args: &DataArgs, output_dir: &Path) -> Result<()> {
    let session = Session::open(args)?;
    let run = run_backtest(
        &session.table,
        &session.trainer()?,
        session.config.backtest_train_ratio,
        &session.config.simulation,
    )?;

    print!("{}", format_summary(&run.summary));
    println!(
        "Test accuracy:     {:.1}%",
        run.classification.accuracy * 100.0
    );
    let rejections = &run.result.rejections;
    if rejections.margin_limit > 0 {
        println!("Margin rejections: {}", rejections.margin_limit);
    }

    let run_dir = write_backtest_artifacts(&run, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_walk_forward_cmd(args: &DataArgs, parallel: bool, output: Option<&Path>) -> Result<()> {
    let session = Session::open(args)?;
    let mut wf = session.config.walk_forward.clone();
    wf.parallel |= parallel;

    let result = run_walk_forward(&session.table, &session.trainer()?, &wf)?;
    let fitness = session.config.fitness.score(&result);
    print!("{}", format_walk_forward(&result, fitness));

    if let Some(path) = output {
        write_walk_forward_json(&result, path)?;
        println!("Result saved to: {}", path.display());
    }
    Ok(())
}

fn run_optimize_cmd(args: &DataArgs, trials: Option<usize>, history_path: &Path) -> Result<()> {
    let session = Session::open(args)?;
    let mut settings = session.config.optimize.settings.clone();
    if let Some(n) = trials {
        settings.n_trials = n;
    }
    let history = TrialHistory::new(history_path);
    let wf = settings.trial_walk_forward(&session.config.walk_forward);
    let table = &session.table;

    let outcome = run_random_search(
        &session.config.optimize.space,
        &settings,
        &session.config.fitness,
        Some(&history),
        |params| {
            let candidate = params.to_best_params(&settings.model_name);
            let labels: LabelSpec = candidate.indicators_as()?;
            let model: NearestCentroidParams = candidate.model_params_as()?;
            let relabelled = table.with_targets(labels.apply(table.bars()))?;
            Ok(run_walk_forward(
                &relabelled,
                &NearestCentroidTrainer::new(model),
                &wf,
            )?)
        },
    )?;

    println!(
        "Trials: {} ({} failed)",
        outcome.trials_run, outcome.failed_trials
    );
    println!("{}", best_trial_line(&outcome.best));
    outcome.best_params.save(&args.params)?;
    println!("Best params saved to: {}", args.params.display());
    Ok(())
}

/// Missing scores print as 0.
fn best_trial_line(best: &TrialRecord) -> String {
    format!(
        "Best trial {}: fitness {:.4} (walk-forward {:.4}, unseen {:.4})",
        best.trial,
        best.score.unwrap_or(0.0),
        best.walk_forward_score.unwrap_or(0.0),
        best.unseen_score.unwrap_or(0.0)
    )
}

fn run_train_cmd(args: &DataArgs, json: bool) -> Result<()> {
    let session = Session::open(args)?;
    let report = evaluate_in_sample(&session.table, &session.trainer()?)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
        return Ok(());
    }

    println!(
        "Labels: horizon {} tp x{} sl x{}",
        session.labels.horizon, session.labels.tp_mult, session.labels.sl_mult
    );
    println!("Accuracy: {:.2}%", report.accuracy * 100.0);
    println!("label  precision  recall     f1  support");
    for direction in Direction::ALL {
        if let Some(scores) = report.classes.get(&direction.label().to_string()) {
            println!(
                "{:>5}  {:>9.3}  {:>6.3}  {:>5.3}  {:>7}",
                direction.label(),
                scores.precision,
                scores.recall,
                scores.f1,
                scores.support
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedgelab_runner::TrialParams;
    use std::collections::BTreeMap;

    fn record(score: Option<f64>, walk_forward: Option<f64>, unseen: Option<f64>) -> TrialRecord {
        TrialRecord {
            trial: 7,
            params: TrialParams {
                indicators: BTreeMap::new(),
                model: BTreeMap::new(),
            },
            score,
            walk_forward_score: walk_forward,
            unseen_score: unseen,
            folds: Vec::new(),
            unseen: None,
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn best_trial_line_shows_all_scores() {
        let line = best_trial_line(&record(Some(1.27), Some(1.5), Some(0.75)));
        assert_eq!(
            line,
            "Best trial 7: fitness 1.2700 (walk-forward 1.5000, unseen 0.7500)"
        );
    }

    #[test]
    fn best_trial_line_tolerates_missing_scores() {
        let line = best_trial_line(&record(None, None, None));
        assert!(line.ends_with("fitness 0.0000 (walk-forward 0.0000, unseen 0.0000)"));
    }

    #[test]
    fn cli_arguments_are_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
