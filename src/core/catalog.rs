//! The fixed catalog of pest classes.
//!
//! The index position of each label is the contract between a model's output
//! dimension and its human-readable name. The ordering is load-bearing: it
//! must stay byte-identical to the ordering the models were trained against,
//! and it is versioned together with whichever checkpoint is deployed.
//! Swapping the order without retraining silently corrupts every prediction.

use crate::core::errors::{PestError, PestResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The 17 jute pest classes, in training order.
pub const JUTE_PEST_LABELS: [&str; 17] = [
    "Beet Armyworm",
    "Black Hairy",
    "Cutworm",
    "Field Cricket",
    "Jute Aphid",
    "Jute Hairy",
    "Jute Red Mite",
    "Jute Semilooper",
    "Jute Stem Girdler",
    "Jute Stem Weevil",
    "Leaf Beetle",
    "Mealybug",
    "Pod Borer",
    "Scopula Emissaria",
    "Termite odontotermes (Rambur)",
    "Termite",
    "Yellow Mite",
];

/// An ordered set of class labels where index = class ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCatalog {
    labels: Vec<String>,
}

impl ClassCatalog {
    /// Creates a catalog from an ordered list of labels.
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// The built-in jute pest catalog matching the shipped checkpoints.
    pub fn jute_pests() -> Self {
        Self::new(JUTE_PEST_LABELS.iter().map(|s| s.to_string()).collect())
    }

    /// Loads a catalog from a JSON array of labels.
    ///
    /// Used when a checkpoint ships with its own label ordering; the file is
    /// versioned alongside the model it belongs to.
    pub fn from_json_file(path: impl AsRef<Path>) -> PestResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let labels: Vec<String> = serde_json::from_slice(&bytes).map_err(|e| {
            PestError::config(format!(
                "failed to parse class catalog {}: {e}",
                path.as_ref().display()
            ))
        })?;
        if labels.is_empty() {
            return Err(PestError::config("class catalog must not be empty"));
        }
        Ok(Self::new(labels))
    }

    /// Returns the label for a class index, if in range.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(|s| s.as_str())
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Default for ClassCatalog {
    fn default() -> Self {
        Self::jute_pests()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_is_fixed() {
        let catalog = ClassCatalog::jute_pests();
        assert_eq!(catalog.len(), 17);
        assert_eq!(catalog.label(0), Some("Beet Armyworm"));
        assert_eq!(catalog.label(14), Some("Termite odontotermes (Rambur)"));
        assert_eq!(catalog.label(16), Some("Yellow Mite"));
        assert_eq!(catalog.label(17), None);
    }

    #[test]
    fn test_catalog_roundtrips_through_json() {
        let catalog = ClassCatalog::jute_pests();
        let json = serde_json::to_string(&catalog).unwrap();
        let back: ClassCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(catalog, back);
    }
}
