//! Core types shared across the classification pipeline.
//!
//! This module hosts the error taxonomy, the fixed class catalog, and the
//! service configuration. Everything here is deliberately free of model or
//! image-processing logic.

pub mod catalog;
pub mod config;
pub mod errors;

pub use catalog::ClassCatalog;
pub use config::{BackendChoice, ClassifierConfig};
pub use errors::{PestError, PestResult};
