//! Conversion of raw model output into an original-resolution mask

use crate::{
    error::{CutoutError, Result},
    refine::MaskRefiner,
    types::SegmentationMask,
};
use image::GrayImage;
use ndarray::{ArrayD, ArrayViewD, Axis, Ix2};

/// Turns inference output into a refined mask at the input image's size
#[derive(Debug, Clone, Default)]
pub struct Postprocessor {
    refiner: MaskRefiner,
}

impl Postprocessor {
    #[must_use]
    pub fn new(refiner: MaskRefiner) -> Self {
        Self { refiner }
    }

    /// Postprocess raw output for an image of `original_size` (width, height)
    ///
    /// Leading batch and channel axes are stripped by taking index 0 until a
    /// 2D plane remains, so `(1, 1, H, W)`, `(1, H, W)`, `(H, W)` and
    /// multi-channel outputs are all accepted. Probabilities are clamped to
    /// `[0, 1]` and scaled to 8 bits by truncation.
    ///
    /// # Errors
    /// - Output with fewer than two axes or an empty plane
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn postprocess(
        &self,
        raw_output: &ArrayD<f32>,
        original_size: (u32, u32),
    ) -> Result<SegmentationMask> {
        let _span = tracing::debug_span!("postprocessing").entered();

        let plane = Self::first_plane(raw_output.view())?;
        let (height, width) = plane.dim();
        if height == 0 || width == 0 {
            return Err(CutoutError::inference(format!(
                "Model output plane is empty: shape {:?}",
                raw_output.shape()
            )));
        }

        let data: Vec<u8> = plane
            .iter()
            .map(|&v| {
                let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
                (v * 255.0) as u8
            })
            .collect();
        let raw_mask = GrayImage::from_raw(width as u32, height as u32, data).ok_or_else(|| {
            CutoutError::processing("Mask buffer does not match model output plane")
        })?;

        let refined = self.refiner.refine(&raw_mask);
        let (out_width, out_height) = original_size;
        Ok(SegmentationMask::from_image(refined).resize(out_width, out_height))
    }

    fn first_plane(view: ArrayViewD<'_, f32>) -> Result<ndarray::ArrayView2<'_, f32>> {
        let shape = view.shape().to_vec();
        if view.ndim() < 2 {
            return Err(CutoutError::inference(format!(
                "Model output must have at least 2 dimensions, got shape {:?}",
                shape
            )));
        }

        let mut view = view;
        while view.ndim() > 2 {
            if view.len_of(Axis(0)) == 0 {
                return Err(CutoutError::inference(format!(
                    "Model output has an empty leading axis: shape {:?}",
                    shape
                )));
            }
            view = view.index_axis_move(Axis(0), 0);
        }

        view.into_dimensionality::<Ix2>()
            .map_err(|e| CutoutError::processing(format!("Failed to view output plane: {}", e)))
    }
}
