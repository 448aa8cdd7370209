//! Histogram of Oriented Gradients shape descriptor.
//!
//! The geometry (9 orientation bins, 16x16-pixel cells, 2x2-cell blocks with
//! L2-Hys normalization) is a fixed hyperparameter of the feature contract:
//! it determines the descriptor length, so it is not user-configurable.

/// Orientation bins over the unsigned [0, 180) degree range.
pub const ORIENTATIONS: usize = 9;
/// Cell side length in pixels.
pub const CELL_SIZE: usize = 16;
/// Block side length in cells.
pub const BLOCK_SIZE: usize = 2;

const EPS: f32 = 1e-5;
/// L2-Hys clipping threshold.
const CLIP: f32 = 0.2;

/// Descriptor length for a `width` x `height` grayscale input.
pub fn descriptor_len(width: usize, height: usize) -> usize {
    let cells_x = width / CELL_SIZE;
    let cells_y = height / CELL_SIZE;
    let blocks_x = cells_x + 1 - BLOCK_SIZE;
    let blocks_y = cells_y + 1 - BLOCK_SIZE;
    blocks_y * blocks_x * BLOCK_SIZE * BLOCK_SIZE * ORIENTATIONS
}

/// Computes the flattened HOG descriptor of a row-major grayscale image.
///
/// Gradients use central differences with zeroed borders; each pixel's
/// magnitude is accumulated into the orientation bin of its cell, cells are
/// averaged over their area, and 2x2-cell blocks are L2-Hys normalized before
/// flattening in row-major block order.
pub fn hog_descriptor(gray: &[f32], width: usize, height: usize) -> Vec<f32> {
    debug_assert_eq!(gray.len(), width * height);

    let cells_x = width / CELL_SIZE;
    let cells_y = height / CELL_SIZE;

    // Per-cell orientation histograms, averaged over cell area.
    let mut cells = vec![0.0f32; cells_y * cells_x * ORIENTATIONS];
    let bin_width = 180.0 / ORIENTATIONS as f32;

    for y in 0..height {
        for x in 0..width {
            let gx = if x == 0 || x == width - 1 {
                0.0
            } else {
                gray[y * width + x + 1] - gray[y * width + x - 1]
            };
            let gy = if y == 0 || y == height - 1 {
                0.0
            } else {
                gray[(y + 1) * width + x] - gray[(y - 1) * width + x]
            };

            let magnitude = gx.hypot(gy);
            if magnitude == 0.0 {
                continue;
            }
            let orientation = gy.atan2(gx).to_degrees().rem_euclid(180.0);
            let bin = ((orientation / bin_width) as usize).min(ORIENTATIONS - 1);

            let cy = y / CELL_SIZE;
            let cx = x / CELL_SIZE;
            if cy < cells_y && cx < cells_x {
                cells[(cy * cells_x + cx) * ORIENTATIONS + bin] += magnitude;
            }
        }
    }
    let cell_area = (CELL_SIZE * CELL_SIZE) as f32;
    for v in cells.iter_mut() {
        *v /= cell_area;
    }

    // Normalized blocks, flattened row-major.
    let blocks_x = cells_x + 1 - BLOCK_SIZE;
    let blocks_y = cells_y + 1 - BLOCK_SIZE;
    let block_len = BLOCK_SIZE * BLOCK_SIZE * ORIENTATIONS;
    let mut descriptor = Vec::with_capacity(blocks_y * blocks_x * block_len);

    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let mut block = Vec::with_capacity(block_len);
            for cy in by..by + BLOCK_SIZE {
                for cx in bx..bx + BLOCK_SIZE {
                    let start = (cy * cells_x + cx) * ORIENTATIONS;
                    block.extend_from_slice(&cells[start..start + ORIENTATIONS]);
                }
            }
            normalize_l2_hys(&mut block);
            descriptor.extend_from_slice(&block);
        }
    }

    descriptor
}

/// L2-Hys: L2-normalize, clip at [`CLIP`], then L2-normalize again.
fn normalize_l2_hys(block: &mut [f32]) {
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + EPS * EPS).sqrt();
    for v in block.iter_mut() {
        *v = (*v / norm).min(CLIP);
    }
    let norm = (block.iter().map(|v| v * v).sum::<f32>() + EPS * EPS).sqrt();
    for v in block.iter_mut() {
        *v /= norm;
    }
}
