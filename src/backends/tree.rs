//! Gradient-boosted-tree backend over handcrafted features.
//!
//! Loads an XGBoost tree dump and scores the feature descriptor produced by
//! [`FeatureExtractor`]. The ensemble was trained with a softprob objective,
//! so its output is already a probability simplex; no extra normalization is
//! applied here, and an ensemble emitting raw margins must not be
//! substituted without adding a softmax.

use std::path::Path;

use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;
use tracing::info;

use crate::backends::{validate_probabilities, ClassifierBackend};
use crate::core::errors::{PestError, PestResult};
use crate::features::FeatureExtractor;

/// Objective the ensemble was trained with; its predictions are per-class
/// probabilities.
const OBJECTIVE: &str = "multi:softprob";

/// Tree-ensemble classifier backend.
pub struct TreeBackend {
    model: GBDT,
    extractor: FeatureExtractor,
    num_classes: usize,
}

impl std::fmt::Debug for TreeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBackend")
            .field("num_classes", &self.num_classes)
            .field("feature_len", &self.extractor.feature_len())
            .finish()
    }
}

impl TreeBackend {
    /// Loads the ensemble from an XGBoost model dump.
    pub fn new(model_path: &Path, num_classes: usize) -> PestResult<Self> {
        let path_str = model_path.to_str().ok_or_else(|| {
            PestError::config(format!(
                "model path {} is not valid UTF-8",
                model_path.display()
            ))
        })?;
        let model = GBDT::from_xgboost_dump(path_str, OBJECTIVE).map_err(|e| {
            PestError::checkpoint_load(format!(
                "failed to load tree ensemble {}: {e}",
                model_path.display()
            ))
        })?;
        let extractor = FeatureExtractor::new();
        info!(
            path = %model_path.display(),
            feature_len = extractor.feature_len(),
            "loaded tree ensemble"
        );
        Ok(Self {
            model,
            extractor,
            num_classes,
        })
    }
}

impl ClassifierBackend for TreeBackend {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn score(&self, image: &image::RgbImage) -> PestResult<Vec<f32>> {
        let features = self.extractor.extract(image);

        // One request scores one row; the ensemble consumes a 1 x D matrix.
        let matrix = Array2::from_shape_vec((1, features.len()), features).map_err(|e| {
            PestError::inference(format!("failed to shape feature matrix: {e}"))
        })?;
        let rows: DataVec = matrix
            .rows()
            .into_iter()
            .map(|row| Data::new_test_data(row.to_vec(), None))
            .collect();

        let (_, probabilities) = self.model.predict_multiclass(&rows, self.num_classes);
        let scores = probabilities.into_iter().next().ok_or_else(|| {
            PestError::inference("tree ensemble returned no predictions")
        })?;

        validate_probabilities(&scores, self.num_classes)?;
        Ok(scores)
    }
}
