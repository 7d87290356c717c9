//! Feature Extractor for the lightweight tier
//!
//! Converts a 128x128 RGB image into the 219-value vector the lightweight
//! classifier was trained on. The layout below is a compatibility contract
//! with that artifact and must only change together with it:
//!
//! | Offset | Count | Feature |
//! |---|---|---|
//! | 0 | 192 | 64-bin densities for R, then G, then B |
//! | 192 | 15 | mean, std, median, min, max (each for R, G, B) |
//! | 207 | 6 | mean H, S, V then std H, S, V |
//! | 213 | 2 | Laplacian mean absolute response, response std |
//! | 215 | 1 | green dominance ratio |
//! | 216 | 2 | brown and yellow mask ratios |
//! | 218 | 1 | spatial variance across quadrants |
//!
//! Histogram bins are counts divided by the pixel count, not probabilities
//! over the bins.

pub mod color;
pub mod texture;

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::preprocess::NormalizedImage;

pub use color::{rgb_to_hsv, ChannelSummary};

/// Number of histogram bins per channel
pub const HISTOGRAM_BINS: usize = 64;

/// Length of the lightweight-tier feature vector
pub const FEATURE_VECTOR_LEN: usize = 219;

/// Guards the green ratio against an all-black image
pub const GREEN_RATIO_EPSILON: f64 = 1e-6;

/// Offsets of each feature group inside the vector
pub mod layout {
    use super::Range;

    pub const HISTOGRAM: Range<usize> = 0..192;
    pub const HISTOGRAM_R: Range<usize> = 0..64;
    pub const HISTOGRAM_G: Range<usize> = 64..128;
    pub const HISTOGRAM_B: Range<usize> = 128..192;
    pub const RGB_MEAN: Range<usize> = 192..195;
    pub const RGB_STD: Range<usize> = 195..198;
    pub const RGB_MEDIAN: Range<usize> = 198..201;
    pub const RGB_MIN: Range<usize> = 201..204;
    pub const RGB_MAX: Range<usize> = 204..207;
    pub const HSV_MEAN: Range<usize> = 207..210;
    pub const HSV_STD: Range<usize> = 210..213;
    pub const EDGE_MEAN: usize = 213;
    pub const EDGE_STD: usize = 214;
    pub const GREEN_RATIO: usize = 215;
    pub const BROWN_RATIO: usize = 216;
    pub const YELLOW_RATIO: usize = 217;
    pub const SPATIAL_VARIANCE: usize = 218;
}

/// Ordered feature values for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// Slice of one feature group, e.g. `layout::HSV_MEAN`
    pub fn group(&self, range: Range<usize>) -> &[f64] {
        &self.0[range]
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Pair each value with its layout name
    pub fn named(&self) -> Vec<(String, f64)> {
        feature_names().into_iter().zip(self.0.iter().copied()).collect()
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Extract the feature vector from a normalized image
///
/// Intended for 128x128 input; densities and ratios are divided by the
/// actual pixel count.
pub fn extract(image: &NormalizedImage) -> FeatureVector {
    let pixels = image.pixels();
    let pixel_count = (pixels.width() as f64) * (pixels.height() as f64);
    let mut values = Vec::with_capacity(FEATURE_VECTOR_LEN);

    // 1. Colour histograms
    let rgb = color::rgb_counts(pixels);
    for channel in &rgb {
        values.extend_from_slice(&channel.histogram(pixel_count));
    }

    // 2. Per-channel statistics, grouped by statistic
    let summaries: Vec<ChannelSummary> = rgb.iter().map(|c| c.summary()).collect();
    values.extend(summaries.iter().map(|s| s.mean));
    values.extend(summaries.iter().map(|s| s.std));
    values.extend(summaries.iter().map(|s| s.median));
    values.extend(summaries.iter().map(|s| s.min));
    values.extend(summaries.iter().map(|s| s.max));

    // 3. HSV statistics
    let hsv: Vec<ChannelSummary> = color::hsv_counts(pixels)
        .iter()
        .map(|c| c.summary())
        .collect();
    values.extend(hsv.iter().map(|s| s.mean));
    values.extend(hsv.iter().map(|s| s.std));

    // 4. Texture
    let (edge_mean, edge_std) = texture::edge_statistics(pixels);
    values.push(edge_mean);
    values.push(edge_std);

    // 5. Green dominance
    let overall_mean = if pixel_count > 0.0 {
        rgb.iter().map(|c| c.sum()).sum::<f64>() / (3.0 * pixel_count)
    } else {
        0.0
    };
    values.push(summaries[1].mean / (overall_mean + GREEN_RATIO_EPSILON));

    // 6. Disease colour masks
    let (brown, yellow) = color::mask_ratios(pixels, pixel_count);
    values.push(brown);
    values.push(yellow);

    // 7. Spatial variance
    values.push(texture::spatial_variance(pixels));

    debug_assert_eq!(values.len(), FEATURE_VECTOR_LEN);
    debug!(
        "Extracted {} features (edge_mean={:.4}, green_ratio={:.4})",
        values.len(),
        edge_mean,
        values[layout::GREEN_RATIO]
    );

    FeatureVector(values)
}

/// Names of the 219 features in vector order
pub fn feature_names() -> Vec<String> {
    let mut names = Vec::with_capacity(FEATURE_VECTOR_LEN);
    for channel in ["r", "g", "b"] {
        for bin in 0..HISTOGRAM_BINS {
            names.push(format!("hist_{}_{:02}", channel, bin));
        }
    }
    for stat in ["mean", "std", "median", "min", "max"] {
        for channel in ["r", "g", "b"] {
            names.push(format!("{}_{}", stat, channel));
        }
    }
    for stat in ["mean", "std"] {
        for channel in ["h", "s", "v"] {
            names.push(format!("{}_{}", stat, channel));
        }
    }
    for name in [
        "edge_mean",
        "edge_std",
        "green_ratio",
        "brown_ratio",
        "yellow_ratio",
        "spatial_variance",
    ] {
        names.push(name.to_string());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{encode_png, normalize_raw, RawImage};
    use image::{Rgb, RgbImage};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn uniform(color: [u8; 3]) -> NormalizedImage {
        NormalizedImage::from_rgb(RgbImage::from_pixel(128, 128, Rgb(color)))
    }

    #[test]
    fn test_feature_names_match_length() {
        let names = feature_names();
        assert_eq!(names.len(), FEATURE_VECTOR_LEN);
        assert_eq!(names[layout::EDGE_MEAN], "edge_mean");
        assert_eq!(names[layout::SPATIAL_VARIANCE], "spatial_variance");
        assert_eq!(names[layout::RGB_STD.start], "std_r");
        assert_eq!(names[layout::HSV_STD.start], "std_h");
    }

    #[test]
    fn test_black_image() {
        let features = extract(&uniform([0, 0, 0]));
        assert_eq!(features.len(), FEATURE_VECTOR_LEN);

        // All mass in bin 0 of each channel
        assert_eq!(features.get(layout::HISTOGRAM_R.start), Some(1.0));
        assert_eq!(features.get(layout::HISTOGRAM_G.start), Some(1.0));
        assert_eq!(features.get(layout::HISTOGRAM_B.start), Some(1.0));
        assert_eq!(features.group(layout::HISTOGRAM).iter().sum::<f64>(), 3.0);

        assert_eq!(features.get(layout::EDGE_MEAN), Some(0.0));
        assert_eq!(features.get(layout::EDGE_STD), Some(0.0));
        assert_eq!(features.get(layout::GREEN_RATIO), Some(0.0));
        assert_eq!(features.get(layout::BROWN_RATIO), Some(0.0));
        assert_eq!(features.get(layout::YELLOW_RATIO), Some(0.0));
        assert_eq!(features.get(layout::SPATIAL_VARIANCE), Some(0.0));
    }

    #[test]
    fn test_uniform_yellow_image() {
        let features = extract(&uniform([200, 160, 40]));

        assert_eq!(features.group(layout::RGB_MEAN), &[200.0, 160.0, 40.0]);
        assert_eq!(features.group(layout::RGB_STD), &[0.0, 0.0, 0.0]);
        assert_eq!(features.group(layout::RGB_MEDIAN), &[200.0, 160.0, 40.0]);
        assert_eq!(features.group(layout::RGB_MIN), &[200.0, 160.0, 40.0]);
        assert_eq!(features.group(layout::RGB_MAX), &[200.0, 160.0, 40.0]);
        assert_eq!(features.get(layout::YELLOW_RATIO), Some(1.0));
        assert_eq!(features.get(layout::BROWN_RATIO), Some(0.0));

        let green_ratio = features.get(layout::GREEN_RATIO).unwrap();
        assert!((green_ratio - 160.0 / (400.0 / 3.0 + 1e-6)).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_green_hsv() {
        let features = extract(&uniform([0, 255, 0]));
        assert_eq!(features.group(layout::HSV_MEAN), &[85.0, 255.0, 255.0]);
        assert_eq!(features.group(layout::HSV_STD), &[0.0, 0.0, 0.0]);
    }

    /// R steps along x (10 | 90 | 250 at x = 32, 96), G steps along y
    /// (200 | 120 | 40 at y = 16, 64), B fixed at 20. Every statistic of R
    /// and G differs from the others, and the Laplacian is nonzero only on
    /// the step lines, so each group's value can be derived by hand.
    fn stepped() -> NormalizedImage {
        NormalizedImage::from_rgb(RgbImage::from_fn(128, 128, |x, y| {
            let r = match x {
                0..=31 => 10,
                32..=95 => 90,
                _ => 250,
            };
            let g = match y {
                0..=15 => 200,
                16..=63 => 120,
                _ => 40,
            };
            Rgb([r, g, 20])
        }))
    }

    #[test]
    fn test_statistic_groups_in_order() {
        let features = extract(&stepped());

        assert_eq!(features.group(layout::RGB_MEAN), &[110.0, 90.0, 20.0]);
        let std = features.group(layout::RGB_STD);
        assert!((std[0] - 7600.0f64.sqrt()).abs() < 1e-9);
        assert!((std[1] - 3100.0f64.sqrt()).abs() < 1e-9);
        assert_eq!(std[2], 0.0);
        assert_eq!(features.group(layout::RGB_MEDIAN), &[90.0, 80.0, 20.0]);
        assert_eq!(features.group(layout::RGB_MIN), &[10.0, 40.0, 20.0]);
        assert_eq!(features.group(layout::RGB_MAX), &[250.0, 200.0, 20.0]);
    }

    #[test]
    fn test_edge_statistics_in_order() {
        let features = extract(&stepped());

        // Response is h(x) + v(y) in units of 80/3: h = +1,-1,+2,-2 on
        // columns 31,32,95,96 and v = -1,+1,-1,+1 on rows 15,16,63,64.
        // Sum of |h + v| is 744 + 496 + 24 units; the response has mean 0
        // and variance 700/9.
        let edge_mean = features.get(layout::EDGE_MEAN).unwrap();
        let edge_std = features.get(layout::EDGE_STD).unwrap();
        assert!((edge_mean - 1264.0 * 80.0 / 3.0 / 16384.0).abs() < 1e-3);
        assert!((edge_std - 700.0f64.sqrt() / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_histogram_channels_in_order() {
        let features = extract(&stepped());

        // Value v lands in bin v / 4 of its channel
        assert_eq!(features.get(layout::HISTOGRAM_R.start + 10 / 4), Some(0.25));
        assert_eq!(features.get(layout::HISTOGRAM_R.start + 90 / 4), Some(0.5));
        assert_eq!(features.get(layout::HISTOGRAM_R.start + 250 / 4), Some(0.25));
        assert_eq!(features.get(layout::HISTOGRAM_G.start + 200 / 4), Some(0.125));
        assert_eq!(features.get(layout::HISTOGRAM_G.start + 120 / 4), Some(0.375));
        assert_eq!(features.get(layout::HISTOGRAM_G.start + 40 / 4), Some(0.5));
        assert_eq!(features.get(layout::HISTOGRAM_B.start + 20 / 4), Some(1.0));
    }

    #[test]
    fn test_length_is_independent_of_source_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for (w, h) in [(128, 128), (640, 480), (37, 211), (1, 1), (256, 64)] {
            let img = RgbImage::from_fn(w, h, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]));
            let raw = RawImage::new(encode_png(&img).unwrap());
            let normalized = normalize_raw(&raw, 128, 128).unwrap();

            let features = extract(&normalized);
            assert_eq!(features.len(), FEATURE_VECTOR_LEN, "source {}x{}", w, h);
            assert!(features.as_slice().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let img = RgbImage::from_fn(128, 128, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]));
        let normalized = NormalizedImage::from_rgb(img);

        assert_eq!(extract(&normalized), extract(&normalized));
    }
}
