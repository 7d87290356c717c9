//! Colour features: histograms, per-channel statistics, HSV statistics and
//! disease-colour masks.

use image::RgbImage;

use super::HISTOGRAM_BINS;

/// Exact summary statistics of one 8-bit channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSummary {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Value counts of one 8-bit channel
#[derive(Debug, Clone)]
pub struct ChannelCounts {
    counts: [u64; 256],
    total: u64,
}

impl ChannelCounts {
    pub fn new() -> Self {
        Self {
            counts: [0; 256],
            total: 0,
        }
    }

    pub fn add(&mut self, value: u8) {
        self.counts[value as usize] += 1;
        self.total += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn sum(&self) -> f64 {
        self.counts
            .iter()
            .enumerate()
            .map(|(v, &c)| v as f64 * c as f64)
            .sum()
    }

    /// 64 equal-width bins over [0, 256), each count divided by `pixel_count`
    pub fn histogram(&self, pixel_count: f64) -> [f64; HISTOGRAM_BINS] {
        let width = 256 / HISTOGRAM_BINS;
        let mut bins = [0.0f64; HISTOGRAM_BINS];
        for (value, &count) in self.counts.iter().enumerate() {
            bins[value / width] += count as f64;
        }
        for bin in bins.iter_mut() {
            *bin /= pixel_count;
        }
        bins
    }

    /// Value at 0-based rank `k` in sorted order
    fn value_at_rank(&self, k: u64) -> f64 {
        let mut seen = 0u64;
        for (value, &count) in self.counts.iter().enumerate() {
            seen += count;
            if seen > k {
                return value as f64;
            }
        }
        255.0
    }

    pub fn summary(&self) -> ChannelSummary {
        if self.total == 0 {
            return ChannelSummary {
                mean: 0.0,
                std: 0.0,
                median: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let n = self.total as f64;
        let mean = self.sum() / n;
        let variance = self
            .counts
            .iter()
            .enumerate()
            .map(|(v, &c)| {
                let diff = v as f64 - mean;
                c as f64 * diff * diff
            })
            .sum::<f64>()
            / n;

        // Even count: average of the two middle values
        let median = if self.total % 2 == 0 {
            let mid = self.total / 2;
            (self.value_at_rank(mid - 1) + self.value_at_rank(mid)) / 2.0
        } else {
            self.value_at_rank(self.total / 2)
        };

        let min = self.counts.iter().position(|&c| c > 0).unwrap_or(0) as f64;
        let max = self.counts.iter().rposition(|&c| c > 0).unwrap_or(0) as f64;

        ChannelSummary {
            mean,
            std: variance.sqrt(),
            median,
            min,
            max,
        }
    }
}

impl Default for ChannelCounts {
    fn default() -> Self {
        Self::new()
    }
}

/// Count every value of the R, G and B channels
pub fn rgb_counts(image: &RgbImage) -> [ChannelCounts; 3] {
    let mut counts = [ChannelCounts::new(), ChannelCounts::new(), ChannelCounts::new()];
    for pixel in image.pixels() {
        for (channel, counter) in counts.iter_mut().enumerate() {
            counter.add(pixel[channel]);
        }
    }
    counts
}

/// 8-bit HSV conversion of one pixel
///
/// V = max(R,G,B); S = trunc(255 * (max - min) / max); H = trunc(255 * h)
/// with h in [0, 1). Hue is held in single precision before scaling, which
/// decides the rounding of primaries (pure green maps to 85).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);

    if maxc == minc {
        return [0, 0, maxc];
    }

    let cr = (maxc - minc) as f32;
    let s = cr / maxc as f32;
    let rc = (maxc - r) as f32 / cr;
    let gc = (maxc - g) as f32 / cr;
    let bc = (maxc - b) as f32 / cr;

    let h = if r == maxc {
        bc - gc
    } else if g == maxc {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    let h = ((h as f64 / 6.0 + 1.0) % 1.0) as f32;
    let uh = ((h as f64 * 255.0) as i32).clamp(0, 255) as u8;
    let us = ((s as f64 * 255.0) as i32).clamp(0, 255) as u8;

    [uh, us, maxc]
}

/// Count every value of the H, S and V channels
pub fn hsv_counts(image: &RgbImage) -> [ChannelCounts; 3] {
    let mut counts = [ChannelCounts::new(), ChannelCounts::new(), ChannelCounts::new()];
    for pixel in image.pixels() {
        let hsv = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        for (channel, counter) in counts.iter_mut().enumerate() {
            counter.add(hsv[channel]);
        }
    }
    counts
}

/// Brown-tone lesion colour: R>100, 50<G<150, B<100
pub fn is_brown(r: u8, g: u8, b: u8) -> bool {
    r > 100 && g > 50 && g < 150 && b < 100
}

/// Yellow-tone chlorosis colour: R>150, G>150, B<100
pub fn is_yellow(r: u8, g: u8, b: u8) -> bool {
    r > 150 && g > 150 && b < 100
}

/// Fractions of brown and yellow pixels, divided by `pixel_count`
pub fn mask_ratios(image: &RgbImage, pixel_count: f64) -> (f64, f64) {
    let mut brown = 0u64;
    let mut yellow = 0u64;
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        if is_brown(r, g, b) {
            brown += 1;
        }
        if is_yellow(r, g, b) {
            yellow += 1;
        }
    }
    (brown as f64 / pixel_count, yellow as f64 / pixel_count)
}
