//! Best-params document: the tuned model name, indicator parameters and
//! model hyperparameters, persisted as pretty JSON.
//!
//! ```json
//! { "model_name": "nearest_centroid",
//!   "indicators": { "horizon": 20 },
//!   "model_params": { "temperature": 0.5 } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Name recorded for the built-in nearest-centroid classifier.
pub const DEFAULT_MODEL_NAME: &str = "nearest_centroid";

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {section} parameters: {source}")]
    Section {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BestParams {
    pub model_name: String,
    pub indicators: BTreeMap<String, Value>,
    pub model_params: BTreeMap<String, Value>,
}

impl Default for BestParams {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            indicators: BTreeMap::new(),
            model_params: BTreeMap::new(),
        }
    }
}

impl BestParams {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ParamsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no optimised params found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ParamsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| ParamsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write as pretty JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ParamsError> {
        let io_err = |source| ParamsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ParamsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)?;
        tracing::info!(path = %path.display(), "saved optimised params");
        Ok(())
    }

    /// Indicator section decoded into a typed struct.
    pub fn indicators_as<T: DeserializeOwned>(&self) -> Result<T, ParamsError> {
        section_as("indicators", &self.indicators)
    }

    /// Model section decoded into a typed struct.
    pub fn model_params_as<T: DeserializeOwned>(&self) -> Result<T, ParamsError> {
        section_as("model_params", &self.model_params)
    }
}

fn section_as<T: DeserializeOwned>(
    section: &'static str,
    values: &BTreeMap<String, Value>,
) -> Result<T, ParamsError> {
    let object: serde_json::Map<String, Value> =
        values.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    serde_json::from_value(Value::Object(object))
        .map_err(|source| ParamsError::Section { section, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelSpec;
    use crate::model::NearestCentroidParams;
    use serde_json::json;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let params = BestParams::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(params, BestParams::default());
        assert_eq!(params.model_name, "nearest_centroid");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("best_params.json");
        let mut params = BestParams::default();
        params.indicators.insert("horizon".into(), json!(12));
        params.model_params.insert("temperature".into(), json!(0.25));
        params.save(&path).unwrap();

        let loaded = BestParams::load_or_default(&path).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn typed_sections_fill_defaults() {
        let mut params = BestParams::default();
        params.indicators.insert("horizon".into(), json!(12));
        params.model_params.insert("standardize".into(), json!(false));

        let labels: LabelSpec = params.indicators_as().unwrap();
        assert_eq!(labels.horizon, 12);
        assert_eq!(labels.tp_mult, 2.0);

        let model: NearestCentroidParams = params.model_params_as().unwrap();
        assert!(!model.standardize);
        assert_eq!(model.temperature, 1.0);
    }

    #[test]
    fn wrong_types_are_reported() {
        let mut params = BestParams::default();
        params.model_params.insert("temperature".into(), json!("hot"));
        let err = params.model_params_as::<NearestCentroidParams>().unwrap_err();
        assert!(matches!(
            err,
            ParamsError::Section {
                section: "model_params",
                ..
            }
        ));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            BestParams::load_or_default(&path),
            Err(ParamsError::Parse { .. })
        ));
    }
}
