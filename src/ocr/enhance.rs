//! Contrast enhancement applied before the second OCR pass.
//!
//! The enhanced image keeps the source dimensions so detector polygons stay
//! in the original pixel coordinate system.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Luma};
use imageproc::contrast::otsu_level;
use tracing::debug;

use crate::core::error::TransformError;

pub trait Enhancer: Send + Sync {
    fn enhance(&self, image: DynamicImage) -> Result<DynamicImage, TransformError>;
}

impl<E: Enhancer + ?Sized> Enhancer for &E {
    fn enhance(&self, image: DynamicImage) -> Result<DynamicImage, TransformError> {
        (**self).enhance(image)
    }
}

impl<E: Enhancer + ?Sized> Enhancer for Box<E> {
    fn enhance(&self, image: DynamicImage) -> Result<DynamicImage, TransformError> {
        (**self).enhance(image)
    }
}

/// Grayscale followed by a global binary threshold. Pixels strictly above
/// the level become white, the rest black.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEnhancer {
    /// Fixed level; when `None` the level is picked with Otsu's method.
    level: Option<u8>,
}

impl ThresholdEnhancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: u8) -> Self {
        Self { level: Some(level) }
    }
}

impl Enhancer for ThresholdEnhancer {
    fn enhance(&self, image: DynamicImage) -> Result<DynamicImage, TransformError> {
        let gray = luma601(&image);
        let level = self.level.unwrap_or_else(|| otsu_level(&gray));
        debug!(
            width = gray.width(),
            height = gray.height(),
            level,
            "binarizing image"
        );
        Ok(DynamicImage::ImageLuma8(binarize(&gray, level)))
    }
}

/// BT.601 luma, the weighting most OCR preprocessing assumes. `to_luma8`
/// uses BT.709 coefficients, which shifts the Otsu level on colour scans.
fn luma601(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        *pixel = if pixel.0[0] > level { Luma([255]) } else { Luma([0]) };
    }
    out
}

/// Decodes `source`, enhances it and writes the result to `target` as PNG.
/// The source format is sniffed from its contents, not its extension.
pub fn enhance_file(
    enhancer: &dyn Enhancer,
    source: &Path,
    target: &Path,
) -> Result<(), TransformError> {
    let image = ImageReader::open(source)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| TransformError::Decode(err.into()))?
        .decode()
        .map_err(TransformError::Decode)?;
    let enhanced = enhancer.enhance(image)?;
    enhanced
        .save_with_format(target, ImageFormat::Png)
        .map_err(TransformError::Encode)
}
