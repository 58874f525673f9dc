//! Classical segmentation used when the model cannot be trusted
//!
//! Grayscale conversion, Gaussian denoising and local-mean adaptive
//! thresholding, followed by filling the largest external contour. Works
//! without any inference backend and is the last line of defence: when it
//! fails, the whole request fails.

use crate::{
    config::{FallbackConfig, SegmentationConfig},
    confidence::ConfidenceScorer,
    error::{CutoutError, Result},
    refine::MaskRefiner,
    types::{SegmentationMask, SegmentationMethod, SegmentationResult},
    utils::morphology::gaussian_blur_odd,
};
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::{
    contours::{find_contours, BorderType, Contour},
    filter::box_filter,
    region_labelling::{connected_components, Connectivity},
};
use instant::Instant;
use log::debug;
use std::collections::VecDeque;

/// Thresholding-and-contours segmenter
#[derive(Debug, Clone)]
pub struct FallbackSegmenter {
    params: FallbackConfig,
    refiner: MaskRefiner,
    scorer: ConfidenceScorer,
    confidence_factor: f64,
}

impl FallbackSegmenter {
    #[must_use]
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            params: config.fallback,
            refiner: MaskRefiner::new(config.refinement),
            scorer: ConfidenceScorer::new(),
            confidence_factor: config.fallback_confidence_factor,
        }
    }

    /// Multiplier applied to the raw confidence of fallback masks
    #[must_use]
    pub fn confidence_factor(&self) -> f64 {
        self.confidence_factor
    }

    /// Produce a refined mask at the image's own resolution
    ///
    /// # Errors
    /// - Image with zero width or height
    pub fn segment_mask(&self, image: &DynamicImage) -> Result<SegmentationMask> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CutoutError::fallback(format!(
                "Cannot segment an image of size {}x{}",
                width, height
            )));
        }

        let gray = image.to_luma8();
        let blurred = gaussian_blur_odd(&gray, self.params.blur_kernel);
        let binary = self.adaptive_threshold(&blurred);
        drop(blurred);

        let filled = fill_largest_external_contour(&binary);
        Ok(SegmentationMask::from_image(self.refiner.refine(&filled)))
    }

    /// Full fallback segmentation: mask, composite and scaled confidence
    ///
    /// `start` is the instant the calling operation began, so the reported
    /// processing time covers any primary attempt that preceded this call.
    ///
    /// # Errors
    /// - The image cannot be segmented or composited
    #[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn fallback_segment(
        &self,
        image: &DynamicImage,
        start: Instant,
    ) -> Result<SegmentationResult> {
        let mask = self.segment_mask(image)?;
        let raw_confidence = self.scorer.score(&mask);
        let confidence = (raw_confidence * self.confidence_factor).clamp(0.0, 1.0);
        debug!(
            "Fallback confidence {:.3} (raw {:.3}, factor {})",
            confidence, raw_confidence, self.confidence_factor
        );

        let composited = mask.composite(image)?;
        let processing_time = start.elapsed().as_secs_f64();

        Ok(SegmentationResult::new(
            composited,
            mask,
            confidence,
            processing_time,
            SegmentationMethod::Fallback,
            false,
        ))
    }

    /// Local-mean threshold: foreground where a pixel exceeds its
    /// neighbourhood mean minus the offset
    fn adaptive_threshold(&self, gray: &GrayImage) -> GrayImage {
        let radius = self.params.block_size / 2;
        let means = box_filter(gray, radius, radius);
        let offset = i32::from(self.params.offset);
        let (width, height) = gray.dimensions();
        GrayImage::from_fn(width, height, |x, y| {
            let value = i32::from(gray.get_pixel(x, y).0[0]);
            let threshold = i32::from(means.get_pixel(x, y).0[0]) - offset;
            Luma([if value > threshold { 255 } else { 0 }])
        })
    }
}

/// Shoelace area enclosed by a contour's points
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice_area.abs() as f64 / 2.0
}

/// Binary mask of the largest top-level outer contour, interior included
///
/// Ties go to the contour found first. No contours yields an all-zero mask.
fn fill_largest_external_contour(binary: &GrayImage) -> GrayImage {
    let (width, height) = binary.dimensions();
    let contours = find_contours::<i32>(binary);

    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.parent.is_none() && c.border_type == BorderType::Outer)
    {
        let area = contour_area(contour);
        if best.map_or(true, |(_, best_area)| area > best_area) {
            best = Some((contour, area));
        }
    }

    let Some(seed) = best.and_then(|(contour, _)| contour.points.first()) else {
        debug!("No external contours found; fallback mask is empty");
        return GrayImage::new(width, height);
    };

    let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));
    let (seed_x, seed_y) = (seed.x.max(0) as u32, seed.y.max(0) as u32);
    let Some(label) = labels.get_pixel_checked(seed_x, seed_y).map(|p| p.0[0]) else {
        return GrayImage::new(width, height);
    };
    if label == 0 {
        return GrayImage::new(width, height);
    }

    let in_component = |x: u32, y: u32| labels.get_pixel(x, y).0[0] == label;
    fill_enclosed(width, height, in_component)
}

/// Region plus every pixel it encloses
///
/// Pixels outside the region that connect to the image border (4-connected)
/// stay background; everything else becomes 255.
fn fill_enclosed(width: u32, height: u32, in_region: impl Fn(u32, u32) -> bool) -> GrayImage {
    let index = |x: u32, y: u32| y as usize * width as usize + x as usize;
    let mut outside = vec![false; width as usize * height as usize];
    let mut queue = VecDeque::new();

    let visit = |x: u32, y: u32, outside: &mut [bool], queue: &mut VecDeque<(u32, u32)>| {
        if let Some(seen) = outside.get_mut(index(x, y)) {
            if !*seen && !in_region(x, y) {
                *seen = true;
                queue.push_back((x, y));
            }
        }
    };

    for x in 0..width {
        visit(x, 0, &mut outside, &mut queue);
        visit(x, height - 1, &mut outside, &mut queue);
    }
    for y in 0..height {
        visit(0, y, &mut outside, &mut queue);
        visit(width - 1, y, &mut outside, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        if x > 0 {
            visit(x - 1, y, &mut outside, &mut queue);
        }
        if x + 1 < width {
            visit(x + 1, y, &mut outside, &mut queue);
        }
        if y > 0 {
            visit(x, y - 1, &mut outside, &mut queue);
        }
        if y + 1 < height {
            visit(x, y + 1, &mut outside, &mut queue);
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let reached = outside.get(index(x, y)).copied().unwrap_or(false);
        Luma([if reached { 0 } else { 255 }])
    })
}
