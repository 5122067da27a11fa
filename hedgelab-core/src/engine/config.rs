//! Simulation parameters, supplied explicitly to every run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters for a single hedging simulation.
///
/// The simulator trusts these values; call [`SimulationConfig::validate`] at
/// the point where configuration enters the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Stop-loss distance in multiples of entry ATR.
    pub sl_mult: f64,
    /// Take-profit distance in multiples of entry ATR.
    pub tp_mult: f64,
    pub initial_balance: f64,
    /// Units per position.
    pub position_size: f64,
    /// Minimum classifier confidence required to open.
    pub conf_threshold: f64,
    /// Minimum ATR/close required to open.
    pub vol_ratio_threshold: f64,
    pub contract_size: f64,
    pub leverage: f64,
    /// Fraction of balance that reserved margin may occupy.
    pub margin_limit: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sl_mult: 1.5,
            tp_mult: 2.5,
            initial_balance: 10_000.0,
            position_size: 0.1,
            conf_threshold: 0.55,
            vol_ratio_threshold: 0.0,
            contract_size: 1.0,
            leverage: 20.0,
            margin_limit: 0.5,
        }
    }
}

impl SimulationConfig {
    /// Preset used to score walk-forward folds: symmetric 2×ATR exits,
    /// unlevered, effectively unlimited margin headroom.
    pub fn evaluation() -> Self {
        Self {
            sl_mult: 2.0,
            tp_mult: 2.0,
            initial_balance: 1_000.0,
            position_size: 0.1,
            conf_threshold: 0.55,
            vol_ratio_threshold: 0.0,
            contract_size: 1.0,
            leverage: 1.0,
            margin_limit: 1e9,
        }
    }

    /// Copy with the entry filters replaced.
    pub fn with_thresholds(&self, conf_threshold: f64, vol_ratio_threshold: f64) -> Self {
        Self {
            conf_threshold,
            vol_ratio_threshold,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("initial_balance", self.initial_balance),
            ("position_size", self.position_size),
            ("contract_size", self.contract_size),
            ("leverage", self.leverage),
            ("margin_limit", self.margin_limit),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        let non_negative = [
            ("sl_mult", self.sl_mult),
            ("tp_mult", self.tp_mult),
            ("vol_ratio_threshold", self.vol_ratio_threshold),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Negative { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(ConfigError::OutOfUnitRange {
                field: "conf_threshold",
                value: self.conf_threshold,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be a finite non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} must lie in [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },
}
