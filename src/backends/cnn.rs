//! MobileNetV2 convolutional backend.
//!
//! Preprocessing matches the training transform exactly: resize the shorter
//! side to 256 with bilinear interpolation, center-crop 224x224, scale to
//! [0, 1], then normalize every channel with mean 0.5 and std 0.5. The
//! network's logits go through a softmax to become probabilities.

use std::path::Path;

use candle_core::{Device, Tensor, D};
use candle_nn::ops::softmax;
use image::{imageops, imageops::FilterType, RgbImage};
use tracing::info;

use crate::backends::{validate_probabilities, ClassifierBackend};
use crate::core::errors::{PestError, PestResult};
use crate::models::{bind_with_repairs, load_checkpoint, MobileNetV2};

/// Shorter-side length after the initial resize.
const RESIZE_SHORTER: u32 = 256;
/// Side length of the center crop fed to the network.
const CROP_SIZE: u32 = 224;
/// Per-channel normalization mean.
const MEAN: f32 = 0.5;
/// Per-channel normalization std.
const STD: f32 = 0.5;

/// Parses a device string: `cpu`, `cuda`, or `cuda:N`.
pub fn parse_device(device: &str) -> PestResult<Device> {
    match device {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0).map_err(PestError::Tensor),
        other => {
            if let Some(ordinal) = other.strip_prefix("cuda:") {
                let ordinal: usize = ordinal.parse().map_err(|_| {
                    PestError::config(format!("invalid device ordinal in '{other}'"))
                })?;
                Device::new_cuda(ordinal).map_err(PestError::Tensor)
            } else {
                Err(PestError::config(format!("unsupported device '{other}'")))
            }
        }
    }
}

/// Convolutional classifier backend.
#[derive(Debug)]
pub struct CnnBackend {
    model: MobileNetV2,
    device: Device,
    num_classes: usize,
}

impl CnnBackend {
    /// Loads the network, running the checkpoint through the repair
    /// strategies in [`crate::models::checkpoint`].
    pub fn new(model_path: &Path, device: Device, num_classes: usize) -> PestResult<Self> {
        let tensors = load_checkpoint(model_path)?;
        let model = bind_with_repairs(&tensors, &device, |vb| MobileNetV2::new(num_classes, vb))?;
        info!(path = %model_path.display(), "loaded CNN checkpoint");
        Ok(Self {
            model,
            device,
            num_classes,
        })
    }

    /// Resize, crop, and normalize into a `1 x 3 x 224 x 224` tensor.
    pub fn preprocess(&self, image: &RgbImage) -> PestResult<Tensor> {
        let (width, height) = image.dimensions();
        let (new_width, new_height) = if width <= height {
            let scaled = (height as f64 * RESIZE_SHORTER as f64 / width as f64).round() as u32;
            (RESIZE_SHORTER, scaled.max(RESIZE_SHORTER))
        } else {
            let scaled = (width as f64 * RESIZE_SHORTER as f64 / height as f64).round() as u32;
            (scaled.max(RESIZE_SHORTER), RESIZE_SHORTER)
        };
        let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);

        let left = (new_width - CROP_SIZE) / 2;
        let top = (new_height - CROP_SIZE) / 2;
        let cropped = imageops::crop_imm(&resized, left, top, CROP_SIZE, CROP_SIZE).to_image();

        let side = CROP_SIZE as usize;
        let mut data = Vec::with_capacity(3 * side * side);
        for channel in 0..3 {
            for y in 0..side {
                for x in 0..side {
                    let sample = cropped.get_pixel(x as u32, y as u32).0[channel] as f32;
                    data.push((sample / 255.0 - MEAN) / STD);
                }
            }
        }

        let tensor = Tensor::from_vec(data, (1, 3, side, side), &self.device)?;
        Ok(tensor)
    }
}

impl ClassifierBackend for CnnBackend {
    fn name(&self) -> &'static str {
        "cnn"
    }

    fn score(&self, image: &RgbImage) -> PestResult<Vec<f32>> {
        let input = self.preprocess(image)?;
        let logits = self.model.forward(&input)?;
        let probabilities = softmax(&logits, D::Minus1)?;
        let scores = probabilities.squeeze(0)?.to_vec1::<f32>()?;
        validate_probabilities(&scores, self.num_classes)?;
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};
    use image::Rgb;

    fn random_backend() -> CnnBackend {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        CnnBackend {
            model: MobileNetV2::new(17, vb).unwrap(),
            device,
            num_classes: 17,
        }
    }

    #[test]
    fn test_parse_device() {
        assert!(matches!(parse_device("cpu").unwrap(), Device::Cpu));
        assert!(parse_device("tpu").is_err());
        assert!(parse_device("cuda:x").is_err());
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let backend = random_backend();
        let image = RgbImage::from_pixel(320, 200, Rgb([255, 128, 0]));
        let tensor = backend.preprocess(&image).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 224, 224]);

        let flat = tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(flat.iter().all(|v| (-1.0..=1.0).contains(v)));
        // Solid red: channel 0 saturates at +1.
        assert!((flat[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_handles_tiny_images() {
        let backend = random_backend();
        let image = RgbImage::from_pixel(10, 7, Rgb([1, 2, 3]));
        let tensor = backend.preprocess(&image).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_score_is_a_probability_simplex() {
        let backend = random_backend();
        let image = RgbImage::from_pixel(64, 64, Rgb([0, 255, 0]));
        let scores = backend.score(&image).unwrap();
        assert_eq!(scores.len(), 17);
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(scores.iter().all(|&v| v >= 0.0));
    }
}
