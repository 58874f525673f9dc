//! Image preprocessing for fixed-size model inference
//!
//! Turns an arbitrary input image into the `(1, 3, H, W)` float tensor the
//! inference backends expect, remembering enough about the input to map the
//! model output back onto it.

use crate::{config::SegmentationConfig, error::Result, utils::geometry::fit_within};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use log::debug;
use ndarray::Array4;

/// Output of [`ImagePreprocessor::preprocess`]
#[derive(Debug, Clone)]
pub struct PreprocessedInput {
    /// Normalized NCHW tensor with values in `[0, 1]`
    pub tensor: Array4<f32>,
    /// (width, height) of the image as received, before any transform
    pub original_size: (u32, u32),
    /// Whether the image was shrunk to respect the maximum dimension
    pub was_downsampled: bool,
}

/// Converts images into model input tensors
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    input_size: (u32, u32),
    max_dimension: u32,
}

impl ImagePreprocessor {
    #[must_use]
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            input_size: config.input_size,
            max_dimension: config.max_dimension,
        }
    }

    /// Model input size as (width, height)
    #[must_use]
    pub fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    /// Preprocess an image for inference
    ///
    /// This function handles:
    /// - Downscaling images whose larger side exceeds the maximum dimension (Lanczos)
    /// - RGB conversion
    /// - Resizing to the model input size, in two stages for very large inputs
    /// - Normalization to `[0, 1]` in NCHW layout with a batch of one
    ///
    /// # Errors
    /// - Tensor allocation for a degenerate input size
    #[allow(clippy::cast_possible_truncation)]
    pub fn preprocess(&self, image: &DynamicImage) -> Result<PreprocessedInput> {
        let _span = tracing::debug_span!("preprocessing").entered();

        let original_size = image.dimensions();
        let (target_width, target_height) = self.input_size;

        let downsampled = fit_within(original_size, self.max_dimension).map(|(w, h)| {
            debug!(
                "Downscaling {}x{} to {}x{} before inference",
                original_size.0, original_size.1, w, h
            );
            image.resize_exact(w, h, FilterType::Lanczos3)
        });
        let was_downsampled = downsampled.is_some();
        let source = downsampled.as_ref().unwrap_or(image);

        let rgb = source.to_rgb8();
        drop(downsampled);

        let (width, height) = rgb.dimensions();
        let largest = width.max(height);
        let target_largest = target_width.max(target_height);

        // Cheap filter first when the input dwarfs the model size
        let resized = if largest > target_largest.saturating_mul(2) {
            let intermediate = image::imageops::resize(
                &rgb,
                target_width.saturating_mul(2),
                target_height.saturating_mul(2),
                FilterType::Triangle,
            );
            drop(rgb);
            image::imageops::resize(
                &intermediate,
                target_width,
                target_height,
                FilterType::Lanczos3,
            )
        } else if (width, height) == (target_width, target_height) {
            rgb
        } else {
            image::imageops::resize(&rgb, target_width, target_height, FilterType::Lanczos3)
        };

        let mut tensor =
            Array4::<f32>::zeros((1, 3, target_height as usize, target_width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                if let Some(slot) = tensor.get_mut([0, channel, y, x]) {
                    *slot = f32::from(pixel.0[channel]) / 255.0;
                }
            }
        }

        Ok(PreprocessedInput {
            tensor,
            original_size,
            was_downsampled,
        })
    }
}
