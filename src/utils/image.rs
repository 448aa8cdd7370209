//! Image decoding and color-space helpers.
//!
//! Decoding is the only place raw request bytes are touched; everything past
//! it operates on a fully populated RGB raster.

use crate::core::errors::PestError;
use image::RgbImage;

/// Decodes an opaque byte buffer into an 8-bit RGB raster.
///
/// Any format supported by the `image` crate is accepted. Malformed or
/// truncated bytes yield [`PestError::ImageDecode`], which the caller should
/// treat as a client-side failure.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, PestError> {
    let img = image::load_from_memory(bytes).map_err(PestError::ImageDecode)?;
    Ok(img.to_rgb8())
}

/// Converts an RGB raster to grayscale with BT.601 luma weights.
///
/// The training pipeline produced 8-bit grayscale with the 0.299/0.587/0.114
/// convention, so samples are rounded to integers before being widened to
/// `f32`. Returned row-major, length `width * height`.
pub fn rgb_to_luma_f32(image: &RgbImage) -> Vec<f32> {
    image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round()
        })
        .collect()
}
