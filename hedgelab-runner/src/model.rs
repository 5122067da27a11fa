//! Reference classifier: standardised nearest centroid.
//!
//! Each class is represented by the mean of its standardised training rows.
//! Probabilities are a softmax over negative Euclidean distances scaled by a
//! temperature. Non-finite feature values are imputed with the training mean.

use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, ModelError, Trainer};
use crate::labels;
use crate::table::FeatureTable;

/// Hyperparameters of [`NearestCentroid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NearestCentroidParams {
    /// Softmax temperature; lower values sharpen probabilities.
    pub temperature: f64,
    /// Scale features to zero mean and unit variance before measuring distance.
    pub standardize: bool,
}

impl Default for NearestCentroidParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            standardize: true,
        }
    }
}

impl NearestCentroidParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(ModelError::InvalidParam {
                name: "temperature".into(),
                reason: format!("must be finite and positive, got {}", self.temperature),
            });
        }
        Ok(())
    }
}

/// Fitted nearest-centroid model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestCentroid {
    params: NearestCentroidParams,
    classes: Vec<u8>,
    means: Vec<f64>,
    scales: Vec<f64>,
    centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    pub fn fit(table: &FeatureTable, params: &NearestCentroidParams) -> Result<Self, ModelError> {
        params.validate()?;
        if table.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let width = table.feature_names().len();
        let rows = table.features();
        let (means, scales) = column_moments(rows, width, params.standardize);

        let mut sums: [Vec<f64>; 3] = [vec![0.0; width], vec![0.0; width], vec![0.0; width]];
        let mut counts = [0usize; 3];
        for (row, target) in rows.iter().zip(table.targets()) {
            let class = labels::encode(*target) as usize;
            counts[class] += 1;
            for (j, value) in row.iter().enumerate() {
                sums[class][j] += standardize(*value, means[j], scales[j]);
            }
        }

        let mut classes = Vec::new();
        let mut centroids = Vec::new();
        for class in 0..3 {
            if counts[class] == 0 {
                continue;
            }
            classes.push(class as u8);
            centroids.push(
                sums[class]
                    .iter()
                    .map(|s| s / counts[class] as f64)
                    .collect(),
            );
        }

        Ok(Self {
            params: params.clone(),
            classes,
            means,
            scales,
            centroids,
        })
    }

    pub fn params(&self) -> &NearestCentroidParams {
        &self.params
    }

    fn probabilities(&self, row: &[f64]) -> Vec<f64> {
        let z: Vec<f64> = row
            .iter()
            .enumerate()
            .map(|(j, v)| standardize(*v, self.means[j], self.scales[j]))
            .collect();
        let logits: Vec<f64> = self
            .centroids
            .iter()
            .map(|c| -euclidean(&z, c) / self.params.temperature)
            .collect();
        softmax(&logits)
    }
}

impl Classifier for NearestCentroid {
    fn classes(&self) -> &[u8] {
        &self.classes
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        features
            .iter()
            .map(|row| {
                if row.len() != self.means.len() {
                    return Err(ModelError::FeatureWidth {
                        expected: self.means.len(),
                        got: row.len(),
                    });
                }
                Ok(self.probabilities(row))
            })
            .collect()
    }
}

/// Fits a [`NearestCentroid`] with fixed hyperparameters.
#[derive(Debug, Clone, Default)]
pub struct NearestCentroidTrainer {
    pub params: NearestCentroidParams,
}

impl NearestCentroidTrainer {
    pub fn new(params: NearestCentroidParams) -> Self {
        Self { params }
    }
}

impl Trainer for NearestCentroidTrainer {
    type Model = NearestCentroid;

    fn train(&self, table: &FeatureTable) -> Result<NearestCentroid, ModelError> {
        NearestCentroid::fit(table, &self.params)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Per-column mean and standard deviation over finite values.
/// Without standardisation (or for constant columns) the scale is 1.
fn column_moments(rows: &[Vec<f64>], width: usize, standardize: bool) -> (Vec<f64>, Vec<f64>) {
    let mut means = vec![0.0; width];
    let mut scales = vec![1.0; width];
    for j in 0..width {
        let finite: Vec<f64> = rows.iter().map(|r| r[j]).filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            continue;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        means[j] = mean;
        if standardize {
            let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;
            let std = var.sqrt();
            if std > 1e-12 {
                scales[j] = std;
            }
        }
    }
    (means, scales)
}

fn standardize(value: f64, mean: f64, scale: f64) -> f64 {
    if value.is_finite() {
        (value - mean) / scale
    } else {
        0.0
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}
