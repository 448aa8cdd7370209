//! Network architecture and checkpoint handling for the CNN backend.

pub mod checkpoint;
pub mod mobilenet_v2;

pub use checkpoint::{bind_with_repairs, load_checkpoint};
pub use mobilenet_v2::MobileNetV2;
