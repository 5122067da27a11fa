//! Fitness: blend of walk-forward and unseen scores used to rank trials.

use serde::{Deserialize, Serialize};

use crate::walk_forward::WalkForwardResult;

/// Weights applied to the walk-forward and unseen scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub walk_forward: f64,
    pub unseen: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            walk_forward: 0.7,
            unseen: 0.3,
        }
    }
}

impl FitnessWeights {
    pub fn combined(&self, walk_forward_score: f64, unseen_score: f64) -> f64 {
        self.walk_forward * walk_forward_score + self.unseen * unseen_score
    }

    pub fn score(&self, result: &WalkForwardResult) -> f64 {
        self.combined(result.walk_forward_score, result.unseen_score)
    }

    /// Returns true if `a` ranks above `b`. Non-finite fitness never wins.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a.is_finite() && (!b.is_finite() || a > b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_blend() {
        let w = FitnessWeights::default();
        assert!((w.combined(2.0, 1.0) - 1.7).abs() < 1e-12);
        assert_eq!(w.combined(0.0, 0.0), 0.0);
    }

    #[test]
    fn score_reads_result() {
        let result = WalkForwardResult {
            walk_forward_score: 1.0,
            unseen_score: 10.0,
            folds: Vec::new(),
            unseen: None,
        };
        assert!((FitnessWeights::default().score(&result) - 3.7).abs() < 1e-12);
    }

    #[test]
    fn comparison() {
        let w = FitnessWeights::default();
        assert!(w.is_better(1.0, 0.5));
        assert!(!w.is_better(0.5, 1.0));
        assert!(!w.is_better(f64::NAN, 0.0));
        assert!(w.is_better(0.0, f64::NEG_INFINITY));
    }
}
