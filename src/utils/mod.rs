//! Utility functions for image handling and prediction ranking.

pub mod image;
pub mod topk;

pub use image::{decode_image, rgb_to_luma_f32};
pub use topk::Topk;
