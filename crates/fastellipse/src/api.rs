//! High-level extraction API.
//!
//! [`EllipseExtractor`] wraps an [`ExtractionConfig`] and runs the whole
//! pipeline on binary edge images. Create once, extract on many images; no
//! state is carried between calls.

use image::{GrayImage, ImageBuffer, Luma};

use crate::config::ExtractionConfig;
use crate::pipeline;
use crate::ExtractionResult;

/// Primary extraction interface.
///
/// # Examples
///
/// ```no_run
/// use fastellipse::EllipseExtractor;
/// use image::GrayImage;
///
/// let extractor = EllipseExtractor::new();
/// let edges = GrayImage::new(640, 480);
/// let result = extractor.extract(&edges);
/// println!("Found {} ellipses", result.ellipses.len());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EllipseExtractor {
    config: ExtractionConfig,
}

impl EllipseExtractor {
    /// Extractor with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with full config control.
    pub fn with_config(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Access the current configuration.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut ExtractionConfig {
        &mut self.config
    }

    /// Extract ellipses from an 8-bit edge image (non-zero = edge).
    pub fn extract(&self, image: &GrayImage) -> ExtractionResult {
        pipeline::extract(image, &self.config)
    }

    /// Extract from a float edge image with intensities in [0, 1].
    ///
    /// Values are scaled to 8 bit and clamped before extraction.
    pub fn extract_luma32f(&self, image: &ImageBuffer<Luma<f32>, Vec<f32>>) -> ExtractionResult {
        let (w, h) = image.dimensions();
        let gray = GrayImage::from_fn(w, h, |x, y| {
            let v = image.get_pixel(x, y)[0];
            Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
        });
        self.extract(&gray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_circle_outline;

    #[test]
    fn extractor_basic_extract() {
        let ex = EllipseExtractor::new();
        let result = ex.extract(&GrayImage::new(200, 200));
        assert!(result.ellipses.is_empty());
        assert_eq!(result.image_size, [200, 200]);
    }

    #[test]
    fn extractor_config_mut() {
        let mut ex = EllipseExtractor::new();
        ex.config_mut().merge.min_coverage = 0.5;
        assert_eq!(ex.config().merge.min_coverage, 0.5);

        let cfg = ExtractionConfig::default();
        let ex = EllipseExtractor::with_config(cfg.clone());
        assert_eq!(ex.config().lines.min_line_len, cfg.lines.min_line_len);
    }

    #[test]
    fn float_input_matches_byte_input() {
        let gray = draw_circle_outline(160, 160, (80, 80), 45);
        let float = ImageBuffer::<Luma<f32>, Vec<f32>>::from_fn(160, 160, |x, y| {
            Luma([gray.get_pixel(x, y)[0] as f32 / 255.0])
        });
        let ex = EllipseExtractor::new();
        assert_eq!(ex.extract_luma32f(&float), ex.extract(&gray));
    }
}
