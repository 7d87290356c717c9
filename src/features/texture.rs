//! Texture and spatial features.

use image::RgbImage;

/// Per-pixel grayscale as the mean of R, G and B, stored in single precision
pub fn grayscale(image: &RgbImage) -> Vec<f32> {
    image
        .pixels()
        .map(|p| ((p[0] as f64 + p[1] as f64 + p[2] as f64) / 3.0) as f32)
        .collect()
}

/// Half-sample symmetric reflection: `d c b a | a b c d | d c b a`
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= len {
            i = 2 * len - i - 1;
        } else {
            return i as usize;
        }
    }
}

/// Convolve with the discrete Laplacian `[[0,1,0],[1,-4,1],[0,1,0]]`
///
/// Out-of-range neighbours are reflected about the image edge, so an edge
/// pixel sees itself as its missing neighbour. Accumulation is in double
/// precision and the response is stored in single precision.
pub fn laplacian(gray: &[f32], width: usize, height: usize) -> Vec<f32> {
    let at = |x: isize, y: isize| -> f64 {
        let x = reflect(x, width);
        let y = reflect(y, height);
        gray[y * width + x] as f64
    };

    let mut out = Vec::with_capacity(width * height);
    for y in 0..height as isize {
        for x in 0..width as isize {
            let response =
                at(x, y - 1) + at(x - 1, y) + at(x + 1, y) + at(x, y + 1) - 4.0 * at(x, y);
            out.push(response as f32);
        }
    }
    out
}

/// Mean absolute Laplacian response and standard deviation of the response
pub fn edge_statistics(image: &RgbImage) -> (f64, f64) {
    let (width, height) = image.dimensions();
    let gray = grayscale(image);
    let edges = laplacian(&gray, width as usize, height as usize);

    if edges.is_empty() {
        return (0.0, 0.0);
    }

    let n = edges.len() as f64;
    let mean_abs = edges.iter().map(|&e| (e as f64).abs()).sum::<f64>() / n;
    let mean = edges.iter().map(|&e| e as f64).sum::<f64>() / n;
    let variance = edges
        .iter()
        .map(|&e| {
            let diff = e as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;

    // The response lives in single precision, so do its statistics
    ((mean_abs as f32) as f64, (variance.sqrt() as f32) as f64)
}

/// Standard deviation of the four quadrant mean intensities
///
/// Quadrants split at `height / 2` and `width / 2`; each mean is taken over
/// all three channels.
pub fn spatial_variance(image: &RgbImage) -> f64 {
    let (width, height) = image.dimensions();
    let (half_w, half_h) = (width / 2, height / 2);

    let mut sums = [0.0f64; 4];
    let mut counts = [0u64; 4];

    for (x, y, pixel) in image.enumerate_pixels() {
        let quadrant = match (y < half_h, x < half_w) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        sums[quadrant] += pixel[0] as f64 + pixel[1] as f64 + pixel[2] as f64;
        counts[quadrant] += 3;
    }

    // A degenerate (zero-area) quadrant contributes a mean of 0
    let means: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    let mean = means.iter().sum::<f64>() / 4.0;
    let variance = means.iter().map(|m| (m - mean) * (m - mean)).sum::<f64>() / 4.0;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(2, 5), 2);
        assert_eq!(reflect(-1, 1), 0);
        assert_eq!(reflect(1, 1), 0);
    }

    #[test]
    fn test_laplacian_single_spike() {
        let mut img = RgbImage::new(128, 128);
        img.put_pixel(64, 64, Rgb([255, 255, 255]));

        let (edge_mean, edge_std) = edge_statistics(&img);
        let expected_mean = 2040.0 / 16384.0;
        let expected_std = (1_300_500.0f64 / 16384.0).sqrt();

        assert!((edge_mean - expected_mean).abs() < 1e-4);
        assert!((edge_std - expected_std).abs() < 1e-3);
    }

    #[test]
    fn test_laplacian_reflects_at_border() {
        // Left column at 100, the rest black. With reflection the border
        // column responds with -100 (zero padding would give -200).
        let img = RgbImage::from_fn(128, 128, |x, _| {
            if x == 0 {
                Rgb([100, 100, 100])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let gray = grayscale(&img);
        let edges = laplacian(&gray, 128, 128);

        assert_eq!(edges[0], -100.0);
        assert_eq!(edges[127 * 128], -100.0);
        assert_eq!(edges[1], 100.0);
        assert_eq!(edges[2], 0.0);

        let (edge_mean, _) = edge_statistics(&img);
        assert!((edge_mean - 1.5625).abs() < 1e-6);
    }

    #[test]
    fn test_grayscale_mean() {
        let img = RgbImage::from_pixel(1, 1, Rgb([10, 20, 31]));
        let gray = grayscale(&img);
        assert!((gray[0] - 61.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_spatial_variance_halves() {
        let img = RgbImage::from_fn(128, 128, |x, _| {
            if x < 64 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        assert!((spatial_variance(&img) - 127.5).abs() < 1e-9);
    }

    #[test]
    fn test_spatial_variance_uniform() {
        let img = RgbImage::from_pixel(128, 128, Rgb([90, 140, 30]));
        assert_eq!(spatial_variance(&img), 0.0);
    }
}
