//! Uniform Local Binary Pattern texture descriptor.
//!
//! Neighbors are sampled on a circle of radius [`LBP_RADIUS`] with bilinear
//! interpolation; samples outside the image read as zero. A pattern is
//! "uniform" when its circular bit string has at most two 0/1 transitions;
//! uniform patterns are labeled by their number of set bits and everything
//! else shares a single catch-all bin, giving `LBP_POINTS + 2` bins total.

/// Sampling circle radius.
pub const LBP_RADIUS: f32 = 3.0;
/// Number of sampling points (8 * radius).
pub const LBP_POINTS: usize = 24;
/// Histogram bins for the uniform method.
pub const LBP_BINS: usize = LBP_POINTS + 2;

/// Guard against division by zero on degenerate (empty-ish) inputs.
const HIST_EPS: f32 = 1e-6;

/// Computes the normalized uniform-LBP histogram of a row-major grayscale
/// image. Output length is always [`LBP_BINS`]; the histogram sums to 1
/// within [`HIST_EPS`] of rounding.
pub fn uniform_lbp_histogram(gray: &[f32], width: usize, height: usize) -> Vec<f32> {
    debug_assert_eq!(gray.len(), width * height);

    // Precompute the sampling offsets once per call.
    let offsets: Vec<(f32, f32)> = (0..LBP_POINTS)
        .map(|p| {
            let angle = 2.0 * std::f32::consts::PI * p as f32 / LBP_POINTS as f32;
            (-LBP_RADIUS * angle.sin(), LBP_RADIUS * angle.cos())
        })
        .collect();

    let mut hist = vec![0.0f32; LBP_BINS];
    let mut bits = [false; LBP_POINTS];

    for y in 0..height {
        for x in 0..width {
            let center = gray[y * width + x];
            for (p, &(dy, dx)) in offsets.iter().enumerate() {
                let sample = bilinear(gray, width, height, y as f32 + dy, x as f32 + dx);
                bits[p] = sample >= center;
            }
            hist[uniform_label(&bits)] += 1.0;
        }
    }

    let total: f32 = hist.iter().sum();
    let divisor = total + HIST_EPS;
    for v in hist.iter_mut() {
        *v /= divisor;
    }
    hist
}

/// Maps a circular bit pattern to its uniform label.
///
/// Uniform patterns (at most two transitions) are labeled by popcount in
/// `0..=LBP_POINTS`; non-uniform patterns get the `LBP_POINTS + 1` bin.
fn uniform_label(bits: &[bool; LBP_POINTS]) -> usize {
    let transitions = (0..LBP_POINTS)
        .filter(|&i| bits[i] != bits[(i + 1) % LBP_POINTS])
        .count();
    if transitions <= 2 {
        bits.iter().filter(|&&b| b).count()
    } else {
        LBP_POINTS + 1
    }
}

/// Bilinear sample with constant-zero padding outside the image.
fn bilinear(gray: &[f32], width: usize, height: usize, y: f32, x: f32) -> f32 {
    let y0 = y.floor();
    let x0 = x.floor();
    let fy = y - y0;
    let fx = x - x0;

    let fetch = |yy: f32, xx: f32| -> f32 {
        if yy < 0.0 || xx < 0.0 {
            return 0.0;
        }
        let (yy, xx) = (yy as usize, xx as usize);
        if yy >= height || xx >= width {
            0.0
        } else {
            gray[yy * width + xx]
        }
    };

    let top = fetch(y0, x0) * (1.0 - fx) + fetch(y0, x0 + 1.0) * fx;
    let bottom = fetch(y0 + 1.0, x0) * (1.0 - fx) + fetch(y0 + 1.0, x0 + 1.0) * fx;
    top * (1.0 - fy) + bottom * fy
}
