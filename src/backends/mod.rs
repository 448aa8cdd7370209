//! Classifier backends.
//!
//! Both backends implement the same contract: score an RGB raster into an
//! ordered vector of 17 class probabilities summing to 1. The aggregator and
//! the service never branch on backend identity; a process picks one backend
//! at startup and serves it for its lifetime.

pub mod cnn;
pub mod tree;

use crate::core::errors::{PestError, PestResult};
use image::RgbImage;

pub use cnn::CnnBackend;
pub use tree::TreeBackend;

/// The shared scoring contract.
pub trait ClassifierBackend: Send + Sync {
    /// Stable backend identifier reported in classification results.
    fn name(&self) -> &'static str;

    /// Scores an image into per-class probabilities.
    ///
    /// The output is ordered by class index, non-negative, and sums to 1
    /// within tolerance. Index-to-label mapping is the class catalog's job;
    /// it is never recomputed here.
    fn score(&self, image: &RgbImage) -> PestResult<Vec<f32>>;
}

/// Tolerance for the probability-simplex check.
const SIMPLEX_TOLERANCE: f32 = 1e-4;

/// Validates that a score vector is a probability distribution over the
/// expected number of classes. Violations (wrong length, NaN/Inf from a
/// corrupt checkpoint, unnormalized margins) surface as inference errors.
pub(crate) fn validate_probabilities(scores: &[f32], expected: usize) -> PestResult<()> {
    if scores.len() != expected {
        return Err(PestError::inference(format!(
            "expected {expected} class scores, got {}",
            scores.len()
        )));
    }
    for (i, &v) in scores.iter().enumerate() {
        if !v.is_finite() {
            return Err(PestError::inference(format!(
                "score for class {i} is not finite: {v}"
            )));
        }
        if v < 0.0 {
            return Err(PestError::inference(format!(
                "score for class {i} is negative: {v}"
            )));
        }
    }
    let sum: f32 = scores.iter().sum();
    if (sum - 1.0).abs() > SIMPLEX_TOLERANCE {
        return Err(PestError::inference(format!(
            "scores sum to {sum}, expected 1 (raw margins must go through a softmax)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_simplex() {
        let mut scores = vec![0.0f32; 17];
        scores[3] = 0.6;
        scores[8] = 0.4;
        assert!(validate_probabilities(&scores, 17).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_length() {
        assert!(validate_probabilities(&[1.0], 17).is_err());
    }

    #[test]
    fn test_validate_rejects_nan_and_negatives() {
        let mut scores = vec![0.0f32; 17];
        scores[0] = f32::NAN;
        scores[1] = 1.0;
        assert!(validate_probabilities(&scores, 17).is_err());

        let mut scores = vec![0.0f32; 17];
        scores[0] = -0.1;
        scores[1] = 1.1;
        assert!(validate_probabilities(&scores, 17).is_err());
    }

    #[test]
    fn test_validate_rejects_raw_margins() {
        let scores = vec![2.0f32; 17];
        assert!(validate_probabilities(&scores, 17).is_err());
    }
}
