//! Random-search optimiser over indicator and model parameters.
//!
//! Every trial samples one value per named range from a seeded RNG, hands the
//! parameters to a caller-supplied objective that runs walk-forward
//! evaluation, and ranks the result by [`FitnessWeights`]. Failing trials are
//! logged, recorded and skipped.

use std::collections::BTreeMap;
use std::io;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::fitness::FitnessWeights;
use crate::history::{TrialHistory, TrialRecord};
use crate::params::{BestParams, DEFAULT_MODEL_NAME};
use crate::walk_forward::{WalkForwardConfig, WalkForwardResult};

// ─── Search space ────────────────────────────────────────────────────

/// Inclusive range of candidate values for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParamRange {
    Int { low: i64, high: i64 },
    Float { low: f64, high: f64 },
    Categorical { choices: Vec<Value> },
}

impl ParamRange {
    fn validate(&self, name: &str) -> Result<(), OptimizeError> {
        let invalid = |reason: String| OptimizeError::InvalidRange {
            name: name.to_string(),
            reason,
        };
        match self {
            Self::Int { low, high } if low > high => {
                Err(invalid(format!("low {low} exceeds high {high}")))
            }
            Self::Float { low, high } if !(low.is_finite() && high.is_finite()) => {
                Err(invalid("bounds must be finite".into()))
            }
            Self::Float { low, high } if low > high => {
                Err(invalid(format!("low {low} exceeds high {high}")))
            }
            Self::Categorical { choices } if choices.is_empty() => {
                Err(invalid("no choices".into()))
            }
            _ => Ok(()),
        }
    }

    fn sample(&self, rng: &mut StdRng) -> Value {
        match self {
            Self::Int { low, high } => Value::from(rng.gen_range(*low..=*high)),
            Self::Float { low, high } => Value::from(rng.gen_range(*low..=*high)),
            Self::Categorical { choices } => choices[rng.gen_range(0..choices.len())].clone(),
        }
    }
}

/// Named ranges, split into indicator and model sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    pub indicators: BTreeMap<String, ParamRange>,
    pub model: BTreeMap<String, ParamRange>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        let mut indicators = BTreeMap::new();
        indicators.insert("horizon".to_string(), ParamRange::Int { low: 5, high: 40 });
        indicators.insert(
            "tp_mult".to_string(),
            ParamRange::Float {
                low: 1.0,
                high: 3.0,
            },
        );
        indicators.insert(
            "sl_mult".to_string(),
            ParamRange::Float {
                low: 1.0,
                high: 3.0,
            },
        );

        let mut model = BTreeMap::new();
        model.insert(
            "temperature".to_string(),
            ParamRange::Float {
                low: 0.05,
                high: 5.0,
            },
        );
        model.insert(
            "standardize".to_string(),
            ParamRange::Categorical {
                choices: vec![Value::Bool(true), Value::Bool(false)],
            },
        );

        Self { indicators, model }
    }
}

impl SearchSpace {
    pub fn validate(&self) -> Result<(), OptimizeError> {
        for (name, range) in self.indicators.iter().chain(&self.model) {
            range.validate(name)?;
        }
        Ok(())
    }

    /// Draw one value per range, in name order within each section.
    pub fn sample(&self, rng: &mut StdRng) -> TrialParams {
        let draw = |ranges: &BTreeMap<String, ParamRange>, rng: &mut StdRng| -> BTreeMap<String, Value> {
            ranges
                .iter()
                .map(|(name, range)| (name.clone(), range.sample(rng)))
                .collect()
        };
        let indicators = draw(&self.indicators, rng);
        let model = draw(&self.model, rng);
        TrialParams { indicators, model }
    }
}

/// Parameters sampled for one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialParams {
    pub indicators: BTreeMap<String, Value>,
    pub model: BTreeMap<String, Value>,
}

impl TrialParams {
    pub fn to_best_params(&self, model_name: &str) -> BestParams {
        BestParams {
            model_name: model_name.to_string(),
            indicators: self.indicators.clone(),
            model_params: self.model.clone(),
        }
    }
}

// ─── Search ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    pub n_trials: usize,
    pub seed: u64,
    /// Recorded in the best-params document.
    pub model_name: String,
    /// Confidence gate used while scoring trials (default 0.0, unlike the
    /// `[walk_forward]` table).
    pub conf_threshold: f64,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            n_trials: 50,
            seed: 42,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            conf_threshold: 0.0,
        }
    }
}

impl OptimizeConfig {
    /// Walk-forward settings for scoring one trial: `base` with this
    /// config's confidence gate.
    pub fn trial_walk_forward(&self, base: &WalkForwardConfig) -> WalkForwardConfig {
        WalkForwardConfig {
            conf_threshold: self.conf_threshold,
            ..base.clone()
        }
    }
}

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("n_trials must be at least 1")]
    ZeroTrials,

    #[error("invalid range for '{name}': {reason}")]
    InvalidRange { name: String, reason: String },

    #[error("all {trials} trials failed")]
    NoSuccessfulTrial { trials: usize },

    #[error("failed to write trial history: {0}")]
    History(#[from] io::Error),
}

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct OptimizeOutcome {
    pub best: TrialRecord,
    pub best_params: BestParams,
    pub trials_run: usize,
    pub failed_trials: usize,
}

/// Seeded random search. The objective maps sampled parameters to a
/// walk-forward result; its errors mark the trial failed without aborting.
pub fn run_random_search<F>(
    space: &SearchSpace,
    config: &OptimizeConfig,
    weights: &FitnessWeights,
    history: Option<&TrialHistory>,
    mut objective: F,
) -> Result<OptimizeOutcome, OptimizeError>
where
    F: FnMut(&TrialParams) -> anyhow::Result<WalkForwardResult>,
{
    if config.n_trials == 0 {
        return Err(OptimizeError::ZeroTrials);
    }
    space.validate()?;

    tracing::info!(trials = config.n_trials, seed = config.seed, "starting random search");
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<TrialRecord> = None;
    let mut failed_trials = 0;

    for trial in 0..config.n_trials {
        let params = space.sample(&mut rng);
        let record = match objective(&params) {
            Ok(result) => {
                let score = weights.score(&result);
                tracing::info!(
                    trial,
                    score,
                    walk_forward = result.walk_forward_score,
                    unseen = result.unseen_score,
                    "trial complete"
                );
                TrialRecord {
                    trial,
                    params,
                    score: Some(score),
                    walk_forward_score: Some(result.walk_forward_score),
                    unseen_score: Some(result.unseen_score),
                    folds: result.folds,
                    unseen: result.unseen,
                    error: None,
                    timestamp: Utc::now(),
                }
            }
            Err(err) => {
                failed_trials += 1;
                tracing::warn!(trial, error = %format!("{err:#}"), "trial failed, skipping");
                TrialRecord {
                    trial,
                    params,
                    score: None,
                    walk_forward_score: None,
                    unseen_score: None,
                    folds: Vec::new(),
                    unseen: None,
                    error: Some(format!("{err:#}")),
                    timestamp: Utc::now(),
                }
            }
        };

        if let Some(history) = history {
            history.append(&record)?;
        }

        if let Some(score) = record.score {
            let current = best.as_ref().and_then(|b| b.score).unwrap_or(f64::NEG_INFINITY);
            if weights.is_better(score, current) {
                best = Some(record);
            }
        }
    }

    let best = best.ok_or(OptimizeError::NoSuccessfulTrial {
        trials: config.n_trials,
    })?;
    tracing::info!(
        trial = best.trial,
        score = best.score.unwrap_or(0.0),
        failed = failed_trials,
        "random search complete"
    );

    Ok(OptimizeOutcome {
        best_params: best.params.to_best_params(&config.model_name),
        best,
        trials_run: config.n_trials,
        failed_trials,
    })
}
