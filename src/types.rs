//! Core types for segmentation results

use crate::error::{CutoutError, Result};
use image::{GrayImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

/// Single-channel 8-bit foreground mask, higher values meaning "more foreground"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    image: GrayImage,
}

impl SegmentationMask {
    /// Create a mask from row-major intensity values
    ///
    /// # Errors
    /// - `data` length does not match `width * height`
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let (width, height) = dimensions;
        let expected = width as usize * height as usize;
        let actual = data.len();
        GrayImage::from_raw(width, height, data)
            .map(Self::from_image)
            .ok_or_else(|| {
                CutoutError::processing(format!(
                    "Mask data length {} does not match {}x{} ({} pixels)",
                    actual, width, height, expected
                ))
            })
    }

    /// Wrap an existing grayscale buffer
    #[must_use]
    pub fn from_image(image: GrayImage) -> Self {
        Self { image }
    }

    /// Mask filled with a single value
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::from_image(GrayImage::from_pixel(width, height, image::Luma([value])))
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.image.as_raw().len()
    }

    /// Raw row-major intensity values
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.image
    }

    /// Intensity at (x, y), `None` when out of bounds
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.image.get_pixel_checked(x, y).map(|p| p.0[0])
    }

    /// Fraction of pixels above the half-intensity mark
    #[must_use]
    pub fn foreground_ratio(&self) -> f64 {
        let total = self.pixel_count();
        if total == 0 {
            return 0.0;
        }
        let foreground = self.as_raw().iter().filter(|&&v| v > 127).count();
        foreground as f64 / total as f64
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of pixels above `threshold`
    #[must_use]
    pub fn bounding_box(&self, threshold: u8) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in self.image.enumerate_pixels() {
            if pixel.0[0] > threshold {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bounds
    }

    /// Resize with linear interpolation
    #[must_use]
    pub fn resize(&self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self::from_image(image::imageops::resize(
            &self.image,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }

    /// Set the alpha channel of `image` to the mask values
    ///
    /// # Errors
    /// - Image and mask dimensions differ
    pub fn apply_to_image(&self, image: &mut RgbaImage) -> Result<()> {
        if image.dimensions() != self.dimensions() {
            let (img_width, img_height) = image.dimensions();
            return Err(CutoutError::processing(format!(
                "Image ({}x{}) and mask ({}x{}) dimensions do not match",
                img_width,
                img_height,
                self.width(),
                self.height()
            )));
        }

        for (pixel, &alpha) in image.pixels_mut().zip(self.as_raw()) {
            pixel.0[3] = alpha;
        }
        Ok(())
    }

    /// Composite onto `image`: convert to RGBA and use the mask as alpha
    ///
    /// # Errors
    /// - Image and mask dimensions differ
    pub fn composite(&self, image: &image::DynamicImage) -> Result<RgbaImage> {
        let mut rgba = image.to_rgba8();
        self.apply_to_image(&mut rgba)?;
        Ok(rgba)
    }

    /// Encode as an 8-bit grayscale PNG
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image.write_to(&mut cursor, ImageFormat::Png)?;
        Ok(buffer)
    }
}

/// Which path produced a segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMethod {
    /// The learned model's mask was accepted
    Primary,
    /// The classical thresholding path produced the mask
    Fallback,
}

impl SegmentationMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for SegmentationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-metric scores that make up a confidence value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    /// 1.0 for a plausible foreground fraction, 0.3 otherwise
    pub ratio_score: f64,
    /// Scaled standard deviation of the normalized mask
    pub sharpness_score: f64,
    /// Largest component area over total foreground area
    pub continuity_score: f64,
}

impl ConfidenceBreakdown {
    pub const RATIO_WEIGHT: f64 = 0.3;
    pub const SHARPNESS_WEIGHT: f64 = 0.4;
    pub const CONTINUITY_WEIGHT: f64 = 0.3;

    /// Weighted combination clamped to `[0, 1]`
    #[must_use]
    pub fn combined(&self) -> f64 {
        let confidence = self.ratio_score * Self::RATIO_WEIGHT
            + self.sharpness_score * Self::SHARPNESS_WEIGHT
            + self.continuity_score * Self::CONTINUITY_WEIGHT;
        confidence.clamp(0.0, 1.0)
    }
}

/// Stages of a single `remove_background` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    NotStarted,
    ModelUnavailable,
    Preprocessing,
    Inferring,
    Postprocessing,
    Scoring,
    Accepted,
    LowConfidenceRetry,
    Compositing,
    Done,
}

impl ProcessingStage {
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::ModelUnavailable => "Model unavailable",
            Self::Preprocessing => "Preprocessing",
            Self::Inferring => "Running inference",
            Self::Postprocessing => "Postprocessing mask",
            Self::Scoring => "Scoring mask",
            Self::Accepted => "Primary mask accepted",
            Self::LowConfidenceRetry => "Low confidence, retrying with fallback",
            Self::Compositing => "Compositing",
            Self::Done => "Done",
        }
    }
}

/// Final output of one segmentation call
///
/// Built once by the processor or the fallback segmenter; the mask always
/// matches the dimensions of the image that was passed in.
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    image: RgbaImage,
    mask: SegmentationMask,
    confidence: f64,
    processing_time: f64,
    method: SegmentationMethod,
    was_downsampled: bool,
}

impl SegmentationResult {
    pub(crate) fn new(
        image: RgbaImage,
        mask: SegmentationMask,
        confidence: f64,
        processing_time: f64,
        method: SegmentationMethod,
        was_downsampled: bool,
    ) -> Self {
        Self {
            image,
            mask,
            confidence,
            processing_time,
            method,
            was_downsampled,
        }
    }

    /// Composited RGBA image, alpha = mask
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn mask(&self) -> &SegmentationMask {
        &self.mask
    }

    /// Confidence in `[0, 1]`
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Elapsed seconds from entry to the end of compositing
    #[must_use]
    pub fn processing_time(&self) -> f64 {
        self.processing_time
    }

    #[must_use]
    pub fn method(&self) -> SegmentationMethod {
        self.method
    }

    #[must_use]
    pub fn was_downsampled(&self) -> bool {
        self.was_downsampled
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Take ownership of the image and mask
    #[must_use]
    pub fn into_parts(self) -> (RgbaImage, SegmentationMask) {
        (self.image, self.mask)
    }

    /// Encode the composited image as an RGBA PNG
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image.write_to(&mut cursor, ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Response payload for the calling layer
    #[must_use]
    pub fn summary(&self) -> RemovalSummary {
        RemovalSummary::from_result(self, None)
    }
}

/// Serializable description of a finished segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalSummary {
    pub success: bool,
    pub confidence: f64,
    pub processing_time: f64,
    pub method: SegmentationMethod,
    pub was_downsampled: bool,
    pub message: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_path: Option<String>,
    pub processed_at: chrono::DateTime<chrono::Utc>,
}

impl RemovalSummary {
    #[must_use]
    pub fn from_result(result: &SegmentationResult, mask_path: Option<String>) -> Self {
        let (width, height) = result.dimensions();
        Self {
            success: true,
            confidence: result.confidence(),
            processing_time: result.processing_time(),
            method: result.method(),
            was_downsampled: result.was_downsampled(),
            message: confidence_message(result.confidence()).to_string(),
            width,
            height,
            mask_path,
            processed_at: chrono::Utc::now(),
        }
    }
}

/// Human-readable verdict for a confidence value
#[must_use]
pub fn confidence_message(confidence: f64) -> &'static str {
    if confidence >= 0.8 {
        "High confidence segmentation"
    } else if confidence >= 0.5 {
        "Segmentation completed"
    } else {
        "Low confidence segmentation; manual review recommended"
    }
}

/// Backend availability report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" with a model, "degraded" in fallback-only mode
    pub status: String,
    pub model_loaded: bool,
}

impl HealthStatus {
    #[must_use]
    pub fn new(model_loaded: bool) -> Self {
        let status = if model_loaded { "healthy" } else { "degraded" };
        Self {
            status: status.to_string(),
            model_loaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_new_validates_length() {
        assert!(SegmentationMask::new(vec![0; 12], (4, 3)).is_ok());
        let err = SegmentationMask::new(vec![0; 11], (4, 3)).unwrap_err();
        assert!(err.to_string().contains("4x3"));
    }

    #[test]
    fn test_mask_foreground_ratio_and_bounds() {
        let mut data = vec![0u8; 100];
        for y in 2..5 {
            for x in 3..8 {
                data[y * 10 + x] = 255;
            }
        }
        let mask = SegmentationMask::new(data, (10, 10)).unwrap();
        assert!((mask.foreground_ratio() - 0.15).abs() < 1e-9);
        assert_eq!(mask.bounding_box(127), Some((3, 2, 7, 4)));
        assert_eq!(SegmentationMask::filled(5, 5, 0).bounding_box(127), None);
    }

    #[test]
    fn test_mask_resize() {
        let mask = SegmentationMask::filled(10, 20, 200);
        let resized = mask.resize(40, 30);
        assert_eq!(resized.dimensions(), (40, 30));
        assert!(resized.as_raw().iter().all(|&v| v == 200));
    }

    #[test]
    fn test_mask_png_roundtrip_dimensions() {
        let mask = SegmentationMask::filled(16, 8, 255);
        let bytes = mask.to_png_bytes().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_mask_composite_sets_alpha() {
        let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            3,
            2,
            image::Rgb([10, 20, 30]),
        ));
        let mask = SegmentationMask::new(vec![0, 50, 100, 150, 200, 255], (3, 2)).unwrap();
        let rgba = mask.composite(&image).unwrap();
        assert_eq!(rgba.get_pixel(1, 0).0, [10, 20, 30, 50]);
        assert_eq!(rgba.get_pixel(2, 1).0, [10, 20, 30, 255]);

        let mut wrong_size = RgbaImage::new(2, 2);
        assert!(mask.apply_to_image(&mut wrong_size).is_err());
    }

    #[test]
    fn test_method_serialization() {
        assert_eq!(
            serde_json::to_string(&SegmentationMethod::Fallback).unwrap(),
            "\"fallback\""
        );
        assert_eq!(SegmentationMethod::Primary.to_string(), "primary");
    }

    #[test]
    fn test_breakdown_weights() {
        let perfect = ConfidenceBreakdown {
            ratio_score: 1.0,
            sharpness_score: 1.0,
            continuity_score: 1.0,
        };
        assert!((perfect.combined() - 1.0).abs() < 1e-12);

        let degenerate = ConfidenceBreakdown {
            ratio_score: 0.3,
            sharpness_score: 0.0,
            continuity_score: 1.0,
        };
        assert!((degenerate.combined() - 0.39).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_message_tiers() {
        assert_eq!(confidence_message(0.95), "High confidence segmentation");
        assert_eq!(confidence_message(0.6), "Segmentation completed");
        assert!(confidence_message(0.2).contains("manual review"));
    }

    #[test]
    fn test_summary_serialization() {
        let result = SegmentationResult::new(
            RgbaImage::new(4, 2),
            SegmentationMask::filled(4, 2, 0),
            0.42,
            0.01,
            SegmentationMethod::Fallback,
            false,
        );
        let json = serde_json::to_value(result.summary()).unwrap();
        assert_eq!(json["method"], "fallback");
        assert_eq!(json["width"], 4);
        assert_eq!(json["success"], true);
        assert!(json.get("mask_path").is_none());
    }

    #[test]
    fn test_health_status() {
        assert_eq!(HealthStatus::new(true).status, "healthy");
        assert_eq!(HealthStatus::new(false).status, "degraded");
    }
}
