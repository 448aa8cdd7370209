//! Handcrafted feature extraction for the tree backend.
//!
//! The pipeline is a pure, deterministic transform from an RGB raster to a
//! fixed-length `f32` descriptor: resize to a canonical 128x128, HSV color
//! histograms, HOG shape descriptor, uniform-LBP texture histogram,
//! concatenated in that order. Every hyperparameter here must match the
//! values used to produce training features; a drift (resize interpolation,
//! bin edges, cell geometry) raises no error but silently degrades accuracy,
//! which is why the regression tests below pin exact behavior.

pub mod color;
pub mod hog;
pub mod lbp;

use image::{imageops::FilterType, RgbImage};

use crate::utils::image::rgb_to_luma_f32;

/// Canonical raster size every image is resized to before extraction.
pub const CANONICAL_SIZE: (u32, u32) = (128, 128);

/// Total descriptor length: color + HOG + LBP.
pub const FEATURE_LEN: usize = 3 * color::HSV_BINS
    + hog_len_at_canonical_size()
    + lbp::LBP_BINS;

const fn hog_len_at_canonical_size() -> usize {
    // 128/16 = 8 cells per side, (8 - 2 + 1)^2 blocks of 2*2*9 values.
    let cells = (CANONICAL_SIZE.0 as usize) / hog::CELL_SIZE;
    let blocks = cells + 1 - hog::BLOCK_SIZE;
    blocks * blocks * hog::BLOCK_SIZE * hog::BLOCK_SIZE * hog::ORIENTATIONS
}

/// Extracts the fixed-length handcrafted descriptor from RGB rasters.
///
/// Stateless and cheap to construct; a fresh descriptor is produced per call
/// and never cached.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Creates a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Length of the descriptor this extractor produces, for any input.
    pub fn feature_len(&self) -> usize {
        FEATURE_LEN
    }

    /// Extracts the descriptor from an RGB raster of any size.
    ///
    /// The mandatory resize uses bilinear interpolation to match the
    /// training pipeline. No branch in this function may change the output
    /// length based on image content.
    pub fn extract(&self, image: &RgbImage) -> Vec<f32> {
        let resized = image::imageops::resize(
            image,
            CANONICAL_SIZE.0,
            CANONICAL_SIZE.1,
            FilterType::Triangle,
        );

        let color_features = color::hsv_histogram(&resized);

        let gray = rgb_to_luma_f32(&resized);
        let width = CANONICAL_SIZE.0 as usize;
        let height = CANONICAL_SIZE.1 as usize;
        let hog_features = hog::hog_descriptor(&gray, width, height);
        let lbp_features = lbp::uniform_lbp_histogram(&gray, width, height);

        let mut features = Vec::with_capacity(FEATURE_LEN);
        features.extend_from_slice(&color_features);
        features.extend_from_slice(&hog_features);
        features.extend_from_slice(&lbp_features);
        debug_assert_eq!(features.len(), FEATURE_LEN);
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        for (x, y, p) in image.enumerate_pixels_mut() {
            *p = Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) % 256) as u8,
            ]);
        }
        image
    }

    /// A fixed 64x64 textured raster covering all three descriptor families:
    /// ramps on red/green and a quadratic-residue pattern on blue.
    fn textured_image() -> RgbImage {
        let mut image = RgbImage::new(64, 64);
        for (x, y, p) in image.enumerate_pixels_mut() {
            let blue = (4 * ((x * x * 3 + x * 11) % 64) + 4 * ((y * y * 5 + y * 7) % 64)) % 256;
            *p = Rgb([(4 * x) as u8, (4 * y) as u8, blue as u8]);
        }
        image
    }

    #[test]
    fn test_feature_len_constant() {
        // 96 color + 1764 HOG + 26 LBP
        assert_eq!(FEATURE_LEN, 96 + 1764 + 26);
    }

    #[test]
    fn test_length_is_independent_of_input_size() {
        let extractor = FeatureExtractor::new();
        for (w, h) in [(128, 128), (64, 64), (640, 480), (31, 257), (1, 1)] {
            let features = extractor.extract(&gradient_image(w, h));
            assert_eq!(features.len(), FEATURE_LEN, "failed for {w}x{h}");
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::new();
        let image = gradient_image(200, 150);
        let a = extractor.extract(&image);
        let b = extractor.extract(&image);
        assert_eq!(a, b);
    }

    #[test]
    fn test_descriptor_values_are_pinned() {
        // Hand-checked descriptor values for the textured raster at a
        // non-canonical input size, so the mandatory resize runs. Any drift
        // in the interpolation filter, histogram bin edges, grayscale
        // weights, or HOG/LBP geometry moves these values and breaks parity
        // with the training features without raising an error; this is the
        // only place such a drift fails loudly.
        const PINNED: &[(usize, f32)] = &[
            // hue histogram
            (0, 0.153813377),
            (11, 0.198233634),
            // saturation histogram
            (40, 0.111280106),
            (63, 0.247977957),
            // value histogram
            (77, 0.102896824),
            (95, 0.208788007),
            // HOG blocks, first through last
            (96, 0.214905366),
            (446, 0.192871556),
            (977, 0.118977636),
            (1859, 0.0874841437),
            // LBP bins, including the non-uniform catch-all
            (1860, 0.0621948242),
            (1875, 0.0177612305),
            (1885, 0.430236816),
        ];

        let features = FeatureExtractor::new().extract(&textured_image());
        for &(index, expected) in PINNED {
            assert!(
                (features[index] - expected).abs() < 1e-6,
                "feature[{index}] was {}, expected {expected}",
                features[index]
            );
        }
    }

    #[test]
    fn test_color_sub_histograms_are_unit_norm() {
        let extractor = FeatureExtractor::new();
        let features = extractor.extract(&gradient_image(128, 128));
        for channel in features[..3 * color::HSV_BINS].chunks(color::HSV_BINS) {
            let norm = channel.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_lbp_tail_sums_to_one_on_constant_image() {
        let extractor = FeatureExtractor::new();
        let image = RgbImage::from_pixel(90, 90, Rgb([55, 120, 201]));
        let features = extractor.extract(&image);
        let lbp = &features[FEATURE_LEN - lbp::LBP_BINS..];
        let sum: f32 = lbp.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4, "LBP mass was {sum}");
    }

    #[test]
    fn test_solid_green_image_profile() {
        let extractor = FeatureExtractor::new();
        let image = RgbImage::from_pixel(128, 128, Rgb([0, 255, 0]));
        let features = extractor.extract(&image);

        // Hue mass concentrated in a single bin (pure green, hue 60/180).
        let hue = &features[..color::HSV_BINS];
        assert_eq!(hue[10], 1.0);

        // Texture-free input: HOG is (near) all zeros.
        let hog_part = &features[3 * color::HSV_BINS..3 * color::HSV_BINS + 1764];
        assert!(hog_part.iter().all(|v| v.abs() < 1e-3));

        // LBP still carries unit mass.
        let lbp_part = &features[FEATURE_LEN - lbp::LBP_BINS..];
        let sum: f32 = lbp_part.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
