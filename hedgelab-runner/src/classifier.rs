//! Classifier and training capabilities.
//!
//! A [`Classifier`] turns feature rows into class probabilities over model
//! labels (0 / 1 / 2); a [`Trainer`] fits one from a labelled table. Both are
//! supplied by the caller, so any model family can plug into walk-forward
//! evaluation. Plain closures implement [`Trainer`].

use hedgelab_core::domain::Signal;
use thiserror::Error;

use crate::labels::{self, LabelError};
use crate::table::FeatureTable;

/// Failures from training or prediction.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature width mismatch: model expects {expected}, got {got}")]
    FeatureWidth { expected: usize, got: usize },

    #[error("invalid model parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("classifier returned {got} probability rows for {expected} feature rows")]
    RowCount { expected: usize, got: usize },

    #[error("probability row {row} has {got} entries but the model has {expected} classes")]
    ProbabilityWidth {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("probability row {row} has no finite maximum")]
    NonFiniteProbability { row: usize },

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("{0}")]
    Other(String),
}

/// Prediction capability of a fitted model.
pub trait Classifier: Send + Sync {
    /// Model labels, in the column order of [`Classifier::predict_proba`].
    fn classes(&self) -> &[u8];

    /// One probability row per feature row.
    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError>;
}

/// Training capability: fit a fresh model on a labelled table.
///
/// Must be shareable across threads since folds may train in parallel.
pub trait Trainer: Sync {
    type Model: Classifier;

    fn train(&self, table: &FeatureTable) -> Result<Self::Model, ModelError>;
}

impl<F, M> Trainer for F
where
    F: Fn(&FeatureTable) -> Result<M, ModelError> + Sync,
    M: Classifier,
{
    type Model = M;

    fn train(&self, table: &FeatureTable) -> Result<M, ModelError> {
        self(table)
    }
}

/// Arg-max class of each probability row, decoded to a trading signal whose
/// confidence is the winning probability. Ties go to the first class.
pub fn predict_signals<C>(model: &C, features: &[Vec<f64>]) -> Result<Vec<Signal>, ModelError>
where
    C: Classifier + ?Sized,
{
    let probabilities = model.predict_proba(features)?;
    if probabilities.len() != features.len() {
        return Err(ModelError::RowCount {
            expected: features.len(),
            got: probabilities.len(),
        });
    }

    let classes = model.classes();
    probabilities
        .iter()
        .enumerate()
        .map(|(row, probs)| {
            if probs.len() != classes.len() || probs.is_empty() {
                return Err(ModelError::ProbabilityWidth {
                    row,
                    expected: classes.len(),
                    got: probs.len(),
                });
            }
            let (best, confidence) = probs.iter().copied().enumerate().fold(
                (0, f64::NEG_INFINITY),
                |(bi, bp), (i, p)| if p > bp { (i, p) } else { (bi, bp) },
            );
            if !confidence.is_finite() {
                return Err(ModelError::NonFiniteProbability { row });
            }
            let direction = labels::decode(classes[best])?;
            Ok(Signal::new(direction, confidence))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedgelab_core::domain::Direction;

    struct Fixed {
        classes: Vec<u8>,
        rows: Vec<Vec<f64>>,
    }

    impl Classifier for Fixed {
        fn classes(&self) -> &[u8] {
            &self.classes
        }

        fn predict_proba(&self, _features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
            Ok(self.rows.clone())
        }
    }

    #[test]
    fn argmax_is_decoded_to_trading_label() {
        let model = Fixed {
            classes: vec![0, 1, 2],
            rows: vec![vec![0.7, 0.2, 0.1], vec![0.1, 0.3, 0.6], vec![0.2, 0.5, 0.3]],
        };
        let signals = predict_signals(&model, &[vec![], vec![], vec![]]).unwrap();
        let dirs: Vec<Direction> = signals.iter().map(|s| s.direction).collect();
        assert_eq!(dirs, vec![Direction::Short, Direction::Long, Direction::Flat]);
        assert_eq!(signals[1].confidence, 0.6);
    }

    #[test]
    fn classes_order_is_respected() {
        // Model trained without the flat class: columns map to labels 0 and 2.
        let model = Fixed {
            classes: vec![0, 2],
            rows: vec![vec![0.4, 0.6]],
        };
        let signals = predict_signals(&model, &[vec![]]).unwrap();
        assert_eq!(signals[0].direction, Direction::Long);
    }

    #[test]
    fn ties_pick_first_class() {
        let model = Fixed {
            classes: vec![0, 1, 2],
            rows: vec![vec![0.4, 0.4, 0.2]],
        };
        let signals = predict_signals(&model, &[vec![]]).unwrap();
        assert_eq!(signals[0].direction, Direction::Short);
    }

    #[test]
    fn malformed_output_is_an_error() {
        let model = Fixed {
            classes: vec![0, 1, 2],
            rows: vec![vec![0.5, 0.5]],
        };
        assert!(matches!(
            predict_signals(&model, &[vec![]]),
            Err(ModelError::ProbabilityWidth { row: 0, .. })
        ));
        assert!(matches!(
            predict_signals(&model, &[vec![], vec![]]),
            Err(ModelError::RowCount { expected: 2, got: 1 })
        ));

        let unknown = Fixed {
            classes: vec![5],
            rows: vec![vec![1.0]],
        };
        assert!(matches!(
            predict_signals(&unknown, &[vec![]]),
            Err(ModelError::Label(_))
        ));
    }

    #[test]
    fn closures_are_trainers() {
        fn assert_trainer<T: Trainer>(_: &T) {}
        let trainer = |_table: &FeatureTable| -> Result<Fixed, ModelError> {
            Err(ModelError::EmptyTrainingSet)
        };
        assert_trainer(&trainer);
    }
}
