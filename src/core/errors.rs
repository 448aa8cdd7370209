//! Error types for the pest classification pipeline.
//!
//! The taxonomy follows the boundaries the service exposes to its caller:
//! input errors (undecodable images) map to client-side failures, startup
//! errors (checkpoints that cannot be bound) leave the service degraded, and
//! inference errors are server faults that are never retried.

use thiserror::Error;

/// Convenient result alias for classification operations.
pub type PestResult<T> = Result<T, PestError>;

/// Errors that can occur while loading models or classifying images.
#[derive(Error, Debug)]
pub enum PestError {
    /// The request bytes were not a supported image encoding.
    ///
    /// This is a client-side failure; the transport layer should report it
    /// as bad input, never as a server fault.
    #[error("image decode")]
    ImageDecode(#[source] image::ImageError),

    /// No model is loaded; the service is running degraded.
    #[error("model unavailable: {message}")]
    ModelUnavailable {
        /// Why no backend is available.
        message: String,
    },

    /// The checkpoint could not be read or bound onto the architecture.
    #[error("checkpoint load: {context}")]
    CheckpointLoad {
        /// What was attempted, including the repair strategies tried.
        context: String,
    },

    /// The model produced an unusable output (shape mismatch, NaN/Inf).
    #[error("inference: {context}")]
    Inference {
        /// Additional context about the failure.
        context: String,
    },

    /// Invalid configuration.
    #[error("configuration: {message}")]
    Config {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from tensor operations in the Candle runtime.
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl PestError {
    /// Creates a `ModelUnavailable` error.
    pub fn model_unavailable(message: impl Into<String>) -> Self {
        PestError::ModelUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `CheckpointLoad` error with context.
    pub fn checkpoint_load(context: impl Into<String>) -> Self {
        PestError::CheckpointLoad {
            context: context.into(),
        }
    }

    /// Creates an `Inference` error with context.
    pub fn inference(context: impl Into<String>) -> Self {
        PestError::Inference {
            context: context.into(),
        }
    }

    /// Creates a `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        PestError::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PestError::model_unavailable("no checkpoint loaded");
        assert_eq!(err.to_string(), "model unavailable: no checkpoint loaded");

        let err = PestError::inference("score vector contained NaN");
        assert_eq!(err.to_string(), "inference: score vector contained NaN");
    }

    #[test]
    fn test_decode_error_has_source() {
        use std::error::Error;

        let inner = image::ImageError::Unsupported(
            image::error::UnsupportedError::from_format_and_kind(
                image::error::ImageFormatHint::Unknown,
                image::error::UnsupportedErrorKind::GenericFeature("bogus".into()),
            ),
        );
        let err = PestError::ImageDecode(inner);
        assert!(err.source().is_some());
    }
}
