//! The classification service.
//!
//! An explicitly constructed, immutable service object the transport layer
//! injects into its request path. Construction never fails: when the model
//! cannot be loaded the service starts degraded and keeps answering
//! liveness probes while `classify` reports `ModelUnavailable`.
//!
//! Requests are independent and stateless beyond the shared read-only model,
//! so a `PestClassifier` can serve concurrent requests without locking.

use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::backends::{cnn, ClassifierBackend, CnnBackend, TreeBackend};
use crate::core::catalog::ClassCatalog;
use crate::core::config::{BackendChoice, ClassifierConfig};
use crate::core::errors::{PestError, PestResult};
use crate::utils::image::decode_image;
use crate::utils::topk::Topk;

/// Upper bound on the number of predictions a single request may ask for.
pub const MAX_TOP_K: usize = 5;

/// One ranked prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Human-readable class label from the catalog.
    pub label: String,
    /// Probability in [0, 1]. Rounded to 4 decimal digits on serialization
    /// only; ranking always works on the raw value.
    #[serde(serialize_with = "round_probability")]
    pub probability: f32,
}

fn round_probability<S: Serializer>(p: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f32((p * 10_000.0).round() / 10_000.0)
}

/// The result of classifying one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Ranked predictions, best first.
    pub predictions: Vec<Prediction>,
    /// Which backend produced the scores ("tree" or "cnn").
    pub backend: String,
}

/// Immutable classification service: one backend, one catalog.
pub struct PestClassifier {
    backend: Option<Box<dyn ClassifierBackend>>,
    catalog: ClassCatalog,
    default_top_k: usize,
}

impl std::fmt::Debug for PestClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PestClassifier")
            .field("ready", &self.is_ready())
            .field("classes", &self.catalog.len())
            .finish()
    }
}

impl PestClassifier {
    /// Builds a service from configuration.
    ///
    /// Model-loading failures are logged and leave the service degraded
    /// instead of propagating, so the process stays alive and inspectable.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let catalog = match &config.catalog_path {
            Some(path) => match ClassCatalog::from_json_file(path) {
                Ok(catalog) => catalog,
                Err(e) => {
                    warn!(error = %e, "failed to load class catalog, using built-in");
                    ClassCatalog::jute_pests()
                }
            },
            None => ClassCatalog::jute_pests(),
        };

        let backend = match Self::build_backend(config, catalog.len()) {
            Ok(backend) => {
                info!(backend = backend.name(), "classifier ready");
                Some(backend)
            }
            Err(e) => {
                warn!(error = %e, "model unavailable, starting degraded");
                None
            }
        };

        Self {
            backend,
            catalog,
            default_top_k: config.top_k.clamp(1, MAX_TOP_K),
        }
    }

    fn build_backend(
        config: &ClassifierConfig,
        num_classes: usize,
    ) -> PestResult<Box<dyn ClassifierBackend>> {
        match config.backend {
            BackendChoice::Tree => {
                let backend = TreeBackend::new(&config.model_path, num_classes)?;
                Ok(Box::new(backend))
            }
            BackendChoice::Cnn => {
                let device = cnn::parse_device(&config.device)?;
                let backend = CnnBackend::new(&config.model_path, device, num_classes)?;
                Ok(Box::new(backend))
            }
        }
    }

    /// Builds a service around an already constructed backend.
    ///
    /// This is the injection seam: tests and embedders can supply any
    /// `ClassifierBackend` without touching the filesystem.
    pub fn with_backend(backend: Box<dyn ClassifierBackend>, catalog: ClassCatalog) -> Self {
        Self {
            backend: Some(backend),
            catalog,
            default_top_k: 1,
        }
    }

    /// Builds a degraded service with no backend.
    pub fn degraded(catalog: ClassCatalog) -> Self {
        Self {
            backend: None,
            catalog,
            default_top_k: 1,
        }
    }

    /// Sets the prediction count `classify_default` uses, clamped to
    /// `1..=MAX_TOP_K`.
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.clamp(1, MAX_TOP_K);
        self
    }

    /// Whether a model is loaded and requests can be served.
    ///
    /// A liveness probe should succeed regardless; this is the readiness
    /// signal.
    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    /// The catalog this service maps class indexes through.
    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    /// Classifies an encoded image, returning the top `k` predictions.
    ///
    /// `k` is clamped to `1..=MAX_TOP_K` and to the catalog size. Fails with
    /// `ModelUnavailable` when degraded, `ImageDecode` on malformed bytes,
    /// and `Inference` when the backend output is unusable; none of these
    /// are retried, since the computation is deterministic.
    pub fn classify(&self, image_bytes: &[u8], k: usize) -> PestResult<Classification> {
        let backend = self.backend.as_deref().ok_or_else(|| {
            PestError::model_unavailable("no model loaded on this process")
        })?;

        let image = decode_image(image_bytes)?;
        let scores = backend.score(&image)?;
        if scores.len() != self.catalog.len() {
            return Err(PestError::inference(format!(
                "backend produced {} scores for a catalog of {} labels",
                scores.len(),
                self.catalog.len()
            )));
        }

        let k = k.clamp(1, MAX_TOP_K);
        let ranked = Topk::new().rank(&scores, k);

        let predictions = ranked
            .into_iter()
            .map(|(index, probability)| {
                let label = self
                    .catalog
                    .label(index)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        PestError::inference(format!(
                            "class index {index} outside catalog of {} labels",
                            self.catalog.len()
                        ))
                    })?;
                Ok(Prediction { label, probability })
            })
            .collect::<PestResult<Vec<_>>>()?;

        debug!(
            backend = backend.name(),
            top_label = %predictions[0].label,
            top_probability = predictions[0].probability,
            "classified image"
        );

        Ok(Classification {
            predictions,
            backend: backend.name().to_string(),
        })
    }

    /// Classifies an encoded image with the configured prediction count.
    ///
    /// Transports that take no per-request `k` call this; the count comes
    /// from `ClassifierConfig::top_k` (or `with_default_top_k`).
    pub fn classify_default(&self, image_bytes: &[u8]) -> PestResult<Classification> {
        self.classify(image_bytes, self.default_top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Deterministic stand-in backend: a fixed distribution over 17 classes.
    struct FixedBackend {
        scores: Vec<f32>,
    }

    impl ClassifierBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "tree"
        }

        fn score(&self, _image: &RgbImage) -> PestResult<Vec<f32>> {
            Ok(self.scores.clone())
        }
    }

    fn fixed_service(scores: Vec<f32>) -> PestClassifier {
        PestClassifier::with_backend(Box::new(FixedBackend { scores }), ClassCatalog::jute_pests())
    }

    fn green_png() -> Vec<u8> {
        let image = RgbImage::from_pixel(128, 128, Rgb([0, 255, 0]));
        let mut bytes = Vec::new();
        image
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        bytes
    }

    fn peaked_scores(index: usize) -> Vec<f32> {
        let mut scores = vec![0.3 / 16.0; 17];
        scores[index] = 0.7;
        scores
    }

    #[test]
    fn test_classify_top1() {
        let service = fixed_service(peaked_scores(4));
        let result = service.classify(&green_png(), 1).unwrap();
        assert_eq!(result.backend, "tree");
        assert_eq!(result.predictions.len(), 1);
        assert_eq!(result.predictions[0].label, "Jute Aphid");
        assert!((result.predictions[0].probability - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_classify_topk_is_tie_stable() {
        let mut scores = vec![0.0f32; 17];
        scores[2] = 0.7;
        scores[0] = 0.1;
        scores[1] = 0.1;
        scores[5] = 0.1;
        let service = fixed_service(scores);
        let result = service.classify(&green_png(), 2).unwrap();
        assert_eq!(result.predictions[0].label, "Cutworm");
        // Ties resolve to the lowest catalog index.
        assert_eq!(result.predictions[1].label, "Beet Armyworm");
    }

    #[test]
    fn test_k_is_clamped() {
        let service = fixed_service(peaked_scores(0));
        let result = service.classify(&green_png(), 99).unwrap();
        assert_eq!(result.predictions.len(), MAX_TOP_K);

        let result = service.classify(&green_png(), 0).unwrap();
        assert_eq!(result.predictions.len(), 1);
    }

    #[test]
    fn test_classify_default_uses_configured_top_k() {
        let service = fixed_service(peaked_scores(4)).with_default_top_k(3);
        let result = service.classify_default(&green_png()).unwrap();
        assert_eq!(result.predictions.len(), 3);
        assert_eq!(result.predictions[0].label, "Jute Aphid");

        // Untouched services fall back to the top-1 default.
        let service = fixed_service(peaked_scores(4));
        let result = service.classify_default(&green_png()).unwrap();
        assert_eq!(result.predictions.len(), 1);

        // The configured count is clamped like a per-request k.
        let service = fixed_service(peaked_scores(4)).with_default_top_k(99);
        let result = service.classify_default(&green_png()).unwrap();
        assert_eq!(result.predictions.len(), MAX_TOP_K);
    }

    #[test]
    fn test_invalid_bytes_are_a_client_error() {
        let service = fixed_service(peaked_scores(0));
        let err = service.classify(b"not an image", 1).unwrap_err();
        assert!(matches!(err, PestError::ImageDecode(_)));
    }

    #[test]
    fn test_degraded_service_reports_model_unavailable() {
        let service = PestClassifier::degraded(ClassCatalog::jute_pests());
        assert!(!service.is_ready());
        let err = service.classify(&green_png(), 1).unwrap_err();
        assert!(matches!(err, PestError::ModelUnavailable { .. }));
        // The object stays usable; liveness is unaffected.
        assert_eq!(service.catalog().len(), 17);
    }

    #[test]
    fn test_from_config_with_missing_model_starts_degraded() {
        let config = crate::core::config::ClassifierConfig::new(
            crate::core::config::BackendChoice::Cnn,
            "/nonexistent/mobilenet_v2_pure.pth",
        );
        let service = PestClassifier::from_config(&config);
        assert!(!service.is_ready());
        let err = service.classify(&green_png(), 1).unwrap_err();
        assert!(matches!(err, PestError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_bad_backend_output_is_an_inference_error() {
        // 16 entries instead of 17: catalog and model disagree.
        let service = fixed_service(vec![1.0 / 16.0; 16]);
        let err = service.classify(&green_png(), 1).unwrap_err();
        assert!(matches!(err, PestError::Inference { .. }));
    }

    #[test]
    fn test_serialized_probability_is_rounded() {
        let prediction = Prediction {
            label: "Cutworm".to_string(),
            probability: 0.123_456_79,
        };
        let json = serde_json::to_string(&prediction).unwrap();
        assert!(json.contains("0.1235"), "json was {json}");
    }
}
