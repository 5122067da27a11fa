//! Run configuration: one TOML file covering simulation, walk-forward,
//! fitness, optimisation and labelling.
//!
//! ```toml
//! [simulation]
//! sl_mult = 1.5
//! tp_mult = 2.5
//!
//! [walk_forward]
//! step = 200
//! conf_threshold = 0.55
//!
//! [optimize]
//! n_trials = 50
//! conf_threshold = 0.0   # gate used while scoring trials
//! ```
//!
//! Every field is optional; missing tables and keys take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use hedgelab_core::engine::{ConfigError, SimulationConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fitness::FitnessWeights;
use crate::labels::LabelSpec;
use crate::optimize::{OptimizeConfig, OptimizeError, SearchSpace};
use crate::walk_forward::{WalkForwardConfig, WalkForwardError};

/// Optimiser settings plus the space it searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OptimizeSection {
    #[serde(flatten)]
    pub settings: OptimizeConfig,
    pub space: SearchSpace,
}

/// Full configuration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Parameters for stand-alone backtests.
    pub simulation: SimulationConfig,
    pub walk_forward: WalkForwardConfig,
    pub fitness: FitnessWeights,
    pub optimize: OptimizeSection,
    /// Labelling for tables without a target column.
    pub labels: LabelSpec,
    /// Fraction of rows used for training in a stand-alone backtest.
    pub backtest_train_ratio: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            walk_forward: WalkForwardConfig::default(),
            fitness: FitnessWeights::default(),
            optimize: OptimizeSection::default(),
            labels: LabelSpec::default(),
            backtest_train_ratio: 0.7,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("[simulation] {0}")]
    Simulation(#[from] ConfigError),

    #[error("[walk_forward.simulation] {0}")]
    EvaluationPreset(ConfigError),

    #[error("[walk_forward] {0}")]
    WalkForward(#[from] WalkForwardError),

    #[error("[optimize] {0}")]
    Optimize(#[from] OptimizeError),

    #[error("{field} must lie in [0, 1], got {value}")]
    Ratio { field: &'static str, value: f64 },

    #[error("labels.horizon must be at least 1")]
    ZeroHorizon,
}

impl RunConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, RunConfigError> {
        let text = fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), hash = %config.config_hash(), "loaded run config");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RunConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        self.simulation.validate()?;
        self.walk_forward
            .scoring_config()
            .validate()
            .map_err(RunConfigError::EvaluationPreset)?;
        self.walk_forward.validate()?;
        self.optimize.space.validate()?;
        if self.optimize.settings.n_trials == 0 {
            return Err(OptimizeError::ZeroTrials.into());
        }
        for (field, value) in [
            ("backtest_train_ratio", self.backtest_train_ratio),
            ("optimize.conf_threshold", self.optimize.settings.conf_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RunConfigError::Ratio { field, value });
            }
        }
        if self.labels.horizon == 0 {
            return Err(RunConfigError::ZeroHorizon);
        }
        Ok(())
    }

    /// BLAKE3 hash of the canonical JSON form; equal configs hash equal.
    pub fn config_hash(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => blake3::hash(json.as_bytes()).to_hex().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "config could not be serialised for hashing");
                String::new()
            }
        }
    }
}
