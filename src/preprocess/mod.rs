//! Image Normalizer
//!
//! Turns uploaded bytes into fixed-size RGB pixel grids:
//! - `RawImage`: the byte buffer plus its declared or sniffed format
//! - `DecodedImage`: the RGB image at its original resolution
//! - `NormalizedImage`: the RGB grid at exactly the size a tier consumes
//!
//! Each classifier tier gets its own `NormalizedImage`; they are never shared.

use std::path::Path;

use image::{imageops::FilterType, ImageFormat, RgbImage};
use tracing::debug;

use crate::utils::error::{DiagnosisError, Result};

/// Resampling filter used for every resize (bicubic)
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Opaque uploaded image bytes
///
/// Owned by the request that produced it and dropped once the diagnosis is
/// assembled.
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    format: Option<ImageFormat>,
}

impl RawImage {
    /// Wrap raw bytes, sniffing the format from the magic number
    pub fn new(bytes: Vec<u8>) -> Self {
        let format = image::guess_format(&bytes).ok();
        Self { bytes, format }
    }

    /// Override the sniffed format with a declared one
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Read an image file into memory
    ///
    /// The format is sniffed from the content first; the file extension is
    /// only used when sniffing fails.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mut raw = Self::new(bytes);
        if raw.format.is_none() {
            raw.format = ImageFormat::from_path(path).ok();
        }
        Ok(raw)
    }

    /// The underlying bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Declared or sniffed format, if known
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode to RGB at the original resolution
    pub fn decode(&self) -> Result<DecodedImage> {
        if self.bytes.is_empty() {
            return Err(DiagnosisError::ImageDecode("empty image buffer".to_string()));
        }

        let image = match self.format {
            Some(format) => image::load_from_memory_with_format(&self.bytes, format),
            None => image::load_from_memory(&self.bytes),
        }
        .map_err(|e| DiagnosisError::ImageDecode(e.to_string()))?;

        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(DiagnosisError::ImageDecode(
                "image decodes to zero area".to_string(),
            ));
        }

        debug!(
            "Decoded {:?} image: {}x{}",
            self.format,
            rgb.width(),
            rgb.height()
        );

        Ok(DecodedImage { rgb })
    }
}

/// An RGB image at its source resolution
#[derive(Debug, Clone)]
pub struct DecodedImage {
    rgb: RgbImage,
}

impl DecodedImage {
    /// Wrap an already decoded RGB image
    pub fn from_rgb(rgb: RgbImage) -> Result<Self> {
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(DiagnosisError::ImageDecode(
                "image decodes to zero area".to_string(),
            ));
        }
        Ok(Self { rgb })
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.rgb
    }
}

/// RGB pixel grid at a tier's exact input resolution
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: RgbImage,
}

impl NormalizedImage {
    /// Use an RGB image as-is (it is assumed to already be at the target size)
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Channel-first `[3, H, W]` buffer with values scaled to [0, 1]
    pub fn to_chw_unit(&self) -> Vec<f32> {
        let num_pixels = (self.width() * self.height()) as usize;
        let mut data = vec![0.0f32; 3 * num_pixels];

        for (i, pixel) in self.pixels.pixels().enumerate() {
            data[i] = pixel[0] as f32 / 255.0;
            data[num_pixels + i] = pixel[1] as f32 / 255.0;
            data[2 * num_pixels + i] = pixel[2] as f32 / 255.0;
        }

        data
    }
}

/// Resize a decoded image to exactly `width` x `height`
///
/// An image already at the target size is copied unchanged.
pub fn normalize(image: &DecodedImage, width: u32, height: u32) -> Result<NormalizedImage> {
    if width == 0 || height == 0 {
        return Err(DiagnosisError::Config(format!(
            "target size must be non-zero, got {}x{}",
            width, height
        )));
    }

    let pixels = if image.rgb.dimensions() == (width, height) {
        image.rgb.clone()
    } else {
        image::imageops::resize(&image.rgb, width, height, RESIZE_FILTER)
    };

    Ok(NormalizedImage { pixels })
}

/// Decode and resize in one step
pub fn normalize_raw(raw: &RawImage, width: u32, height: u32) -> Result<NormalizedImage> {
    let decoded = raw.decode()?;
    normalize(&decoded, width, height)
}

/// Encode an RGB image as PNG bytes
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| DiagnosisError::ImageDecode(e.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        encode_png(&img).unwrap()
    }

    #[test]
    fn test_raw_image_sniffs_format() {
        let raw = RawImage::new(png_bytes(4, 4, [10, 20, 30]));
        assert_eq!(raw.format(), Some(ImageFormat::Png));
        assert!(!raw.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let raw = RawImage::new(b"definitely not an image".to_vec());
        assert!(matches!(raw.decode(), Err(DiagnosisError::ImageDecode(_))));
    }

    #[test]
    fn test_decode_rejects_empty() {
        let raw = RawImage::new(Vec::new());
        assert!(matches!(raw.decode(), Err(DiagnosisError::ImageDecode(_))));
    }

    #[test]
    fn test_normalize_exact_size() {
        let raw = RawImage::new(png_bytes(300, 170, [0, 255, 0]));
        let deep = normalize_raw(&raw, 224, 224).unwrap();
        let light = normalize_raw(&raw, 128, 128).unwrap();

        assert_eq!(deep.dimensions(), (224, 224));
        assert_eq!(light.dimensions(), (128, 128));
        // Uniform colour survives resampling
        assert_eq!(light.pixels().get_pixel(64, 64), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_normalize_same_size_is_copy() {
        let img = RgbImage::from_fn(128, 128, |x, y| Rgb([x as u8, y as u8, 7]));
        let decoded = DecodedImage::from_rgb(img.clone()).unwrap();
        let normalized = normalize(&decoded, 128, 128).unwrap();
        assert_eq!(normalized.pixels(), &img);
    }

    #[test]
    fn test_alpha_is_dropped() {
        let rgba = RgbaImage::from_pixel(8, 8, Rgba([200, 100, 50, 0]));
        let mut buffer = std::io::Cursor::new(Vec::new());
        rgba.write_to(&mut buffer, ImageFormat::Png).unwrap();

        let raw = RawImage::new(buffer.into_inner());
        let decoded = raw.decode().unwrap();
        assert_eq!(decoded.as_rgb().get_pixel(0, 0), &Rgb([200, 100, 50]));
    }

    #[test]
    fn test_zero_target_size() {
        let decoded = DecodedImage::from_rgb(RgbImage::new(4, 4)).unwrap();
        assert!(matches!(
            normalize(&decoded, 0, 128),
            Err(DiagnosisError::Config(_))
        ));
    }

    #[test]
    fn test_to_chw_unit() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 51]));
        let chw = NormalizedImage::from_rgb(img).to_chw_unit();

        assert_eq!(chw.len(), 12);
        assert!(chw[..4].iter().all(|&v| v == 1.0));
        assert!(chw[4..8].iter().all(|&v| v == 0.0));
        assert!(chw[8..].iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }
}
