//! # Jute Pest
//!
//! A Rust library that classifies images of jute-crop pests into one of 17
//! categories using two interchangeable backends: a gradient-boosted-tree
//! classifier over handcrafted color/shape/texture features, and a
//! MobileNetV2 convolutional network run through Candle.
//!
//! ## Components
//!
//! - **Feature extraction**: deterministic HSV histogram + HOG + uniform LBP
//!   descriptor with a fixed length, independent of input image size
//! - **Checkpoint normalization**: ordered repair strategies that reconcile
//!   parameter-naming drift across training-tool versions
//! - **Dual backends**: one `ClassifierBackend` trait, two implementations
//! - **Ranked predictions**: top-k aggregation over a fixed class catalog
//!
//! ## Modules
//!
//! * [`core`] - Error types, class catalog, and configuration
//! * [`features`] - Handcrafted feature extraction pipeline
//! * [`models`] - MobileNetV2 architecture and checkpoint loading
//! * [`backends`] - Tree-ensemble and CNN classifier backends
//! * [`service`] - The injectable classification service
//! * [`utils`] - Image decoding and top-k utilities
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jute_pest::core::config::{BackendChoice, ClassifierConfig};
//! use jute_pest::service::PestClassifier;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClassifierConfig::new(BackendChoice::Cnn, "models/mobilenet_v2_pure.pth");
//! let classifier = PestClassifier::from_config(&config);
//!
//! let bytes = std::fs::read("pest.jpg")?;
//! let result = classifier.classify(&bytes, 5)?;
//! for prediction in &result.predictions {
//!     println!("{}: {:.4}", prediction.label, prediction.probability);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod core;
pub mod features;
pub mod models;
pub mod service;
pub mod utils;

// Re-export commonly used items for convenience
pub use crate::core::catalog::ClassCatalog;
pub use crate::core::config::{BackendChoice, ClassifierConfig};
pub use crate::core::errors::{PestError, PestResult};
pub use backends::ClassifierBackend;
pub use features::FeatureExtractor;
pub use service::{Classification, PestClassifier, Prediction};

/// Number of pest classes the models are trained for.
pub const NUM_CLASSES: usize = 17;
