//! Configuration for the classification service.
//!
//! Each service process picks exactly one backend; the two backends are
//! independent deployments of the same contract and are never composed at
//! runtime.

use crate::core::errors::{PestError, PestResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which classifier backend a process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Gradient-boosted-tree ensemble over handcrafted features.
    Tree,
    /// MobileNetV2 convolutional network.
    Cnn,
}

impl std::fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendChoice::Tree => write!(f, "tree"),
            BackendChoice::Cnn => write!(f, "cnn"),
        }
    }
}

/// Configuration for constructing a [`crate::service::PestClassifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Backend this process serves.
    pub backend: BackendChoice,
    /// Path to the model file (XGBoost dump for `tree`, `.pth` or
    /// `.safetensors` checkpoint for `cnn`).
    pub model_path: PathBuf,
    /// Optional path to a JSON class catalog versioned with the model.
    /// Defaults to the built-in jute pest catalog.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    /// Number of predictions `classify_default` returns (capped at 5).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Device for CNN inference ("cpu" or "cuda:N"). Ignored by the tree
    /// backend.
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_top_k() -> usize {
    1
}

fn default_device() -> String {
    "cpu".to_string()
}

impl ClassifierConfig {
    /// Creates a configuration with defaults for everything but the backend
    /// and model path.
    pub fn new(backend: BackendChoice, model_path: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            model_path: model_path.into(),
            catalog_path: None,
            top_k: default_top_k(),
            device: default_device(),
        }
    }

    /// Sets the class catalog path.
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// Sets the default top-k.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets the inference device.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> PestResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PestError::config(format!(
                "failed to parse config {}: {e}",
                path.as_ref().display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClassifierConfig::new(BackendChoice::Tree, "model/jute_pest_robust.json");
        assert_eq!(config.top_k, 1);
        assert_eq!(config.device, "cpu");
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "backend": "cnn",
            "model_path": "model/mobilenet_v2_pure.pth",
            "top_k": 5
        }"#;
        let config: ClassifierConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend, BackendChoice::Cnn);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.device, "cpu");
    }

    #[test]
    fn test_backend_choice_display() {
        assert_eq!(BackendChoice::Tree.to_string(), "tree");
        assert_eq!(BackendChoice::Cnn.to_string(), "cnn");
    }
}
