//! HSV color histograms.
//!
//! Color conversion follows the 8-bit OpenCV convention the training features
//! were computed with: H in [0, 180), S and V in [0, 256). The three channel
//! histograms are L2-normalized independently and concatenated H, S, V; that
//! layout is part of the feature contract.

use image::RgbImage;

/// Histogram bins per HSV channel.
pub const HSV_BINS: usize = 32;

/// Upper bound (exclusive) of the 8-bit hue range.
const H_RANGE: f32 = 180.0;
/// Upper bound (exclusive) of the 8-bit saturation/value range.
const SV_RANGE: f32 = 256.0;

/// Converts one 8-bit RGB sample to OpenCV-convention HSV.
///
/// Returns `(h, s, v)` with `h` in [0, 180) and `s`, `v` in [0, 255].
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { delta * 255.0 / v } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }
    // 8-bit hue is halved so it fits the [0, 180) range.
    (h / 2.0, s, v)
}

/// Computes the concatenated H, S, V histogram descriptor.
///
/// Each channel gets an independent [`HSV_BINS`]-bin histogram which is
/// L2-normalized on its own before concatenation. Output length is
/// `3 * HSV_BINS` for any input image.
pub fn hsv_histogram(image: &RgbImage) -> Vec<f32> {
    let mut hist_h = vec![0.0f32; HSV_BINS];
    let mut hist_s = vec![0.0f32; HSV_BINS];
    let mut hist_v = vec![0.0f32; HSV_BINS];

    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        let (h, s, v) = rgb_to_hsv(r, g, b);
        hist_h[bin_index(h, H_RANGE)] += 1.0;
        hist_s[bin_index(s, SV_RANGE)] += 1.0;
        hist_v[bin_index(v, SV_RANGE)] += 1.0;
    }

    l2_normalize(&mut hist_h);
    l2_normalize(&mut hist_s);
    l2_normalize(&mut hist_v);

    let mut out = Vec::with_capacity(3 * HSV_BINS);
    out.extend_from_slice(&hist_h);
    out.extend_from_slice(&hist_s);
    out.extend_from_slice(&hist_v);
    out
}

fn bin_index(value: f32, range: f32) -> usize {
    ((value * HSV_BINS as f32 / range) as usize).min(HSV_BINS - 1)
}

fn l2_normalize(hist: &mut [f32]) {
    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in hist.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_hsv_primaries() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!((h, s, v), (0.0, 255.0, 255.0));

        let (h, _, _) = rgb_to_hsv(0, 255, 0);
        assert_eq!(h, 60.0);

        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert_eq!(h, 120.0);
    }

    #[test]
    fn test_hsv_gray_has_zero_saturation() {
        let (h, s, v) = rgb_to_hsv(128, 128, 128);
        assert_eq!(h, 0.0);
        assert_eq!(s, 0.0);
        assert_eq!(v, 128.0);
    }

    #[test]
    fn test_histogram_channels_are_l2_normalized() {
        let mut image = RgbImage::new(16, 16);
        for (x, y, p) in image.enumerate_pixels_mut() {
            *p = Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8]);
        }
        let hist = hsv_histogram(&image);
        assert_eq!(hist.len(), 3 * HSV_BINS);
        for channel in hist.chunks(HSV_BINS) {
            let norm = channel.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "channel norm was {norm}");
        }
    }

    #[test]
    fn test_solid_green_concentrates_hue() {
        let image = RgbImage::from_pixel(32, 32, Rgb([0, 255, 0]));
        let hist = hsv_histogram(&image);
        // Pure green sits at hue 60 of 180, bin 60 * 32 / 180 = 10.
        assert_eq!(hist[10], 1.0);
        let others: f32 = hist[..HSV_BINS]
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 10)
            .map(|(_, v)| v.abs())
            .sum();
        assert_eq!(others, 0.0);
    }
}
