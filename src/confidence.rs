//! Ground-truth-free quality scoring of segmentation masks
//!
//! Three statistics of the mask are combined into one advisory number:
//! how much of the frame is foreground, how bimodal the intensities are, and
//! how much of the foreground sits in a single connected blob. See
//! [`ConfidenceBreakdown`] for the weights.

use crate::{
    error::{CutoutError, Result},
    types::{ConfidenceBreakdown, SegmentationMask},
    utils::geometry::component_areas,
};
use image::{GrayImage, Luma};
use log::warn;

/// Score returned whenever a mask cannot be scored
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

const MIN_FOREGROUND_RATIO: f64 = 0.05;
const MAX_FOREGROUND_RATIO: f64 = 0.95;
const IMPLAUSIBLE_RATIO_SCORE: f64 = 0.3;
const SHARPNESS_SCALE: f64 = 3.0;

/// Stateless mask scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Confidence in `[0, 1]` for a mask; never fails
    ///
    /// Any problem computing the metrics (an empty mask, for instance) yields
    /// [`NEUTRAL_CONFIDENCE`]. Identical masks always produce identical scores.
    #[must_use]
    pub fn score(&self, mask: &SegmentationMask) -> f64 {
        match self.breakdown(mask.as_image()) {
            Ok(breakdown) => breakdown.combined(),
            Err(e) => {
                warn!("Confidence scoring failed, using neutral score: {}", e);
                NEUTRAL_CONFIDENCE
            }
        }
    }

    /// Individual metric scores for a mask
    ///
    /// # Errors
    /// - Mask with no pixels
    pub fn breakdown(&self, mask: &GrayImage) -> Result<ConfidenceBreakdown> {
        let total = mask.as_raw().len();
        if total == 0 {
            return Err(CutoutError::processing("Cannot score an empty mask"));
        }

        Ok(ConfidenceBreakdown {
            ratio_score: ratio_score(mask, total),
            sharpness_score: sharpness_score(mask, total),
            continuity_score: continuity_score(mask),
        })
    }
}

fn ratio_score(mask: &GrayImage, total: usize) -> f64 {
    // v / 255 > 0.5 is v > 127 for 8-bit values
    let foreground = mask.as_raw().iter().filter(|&&v| v > 127).count();
    let ratio = foreground as f64 / total as f64;
    if !(MIN_FOREGROUND_RATIO..=MAX_FOREGROUND_RATIO).contains(&ratio) {
        IMPLAUSIBLE_RATIO_SCORE
    } else {
        1.0
    }
}

fn sharpness_score(mask: &GrayImage, total: usize) -> f64 {
    let n = total as f64;
    let mean = mask
        .as_raw()
        .iter()
        .map(|&v| f64::from(v) / 255.0)
        .sum::<f64>()
        / n;
    let variance = mask
        .as_raw()
        .iter()
        .map(|&v| {
            let d = f64::from(v) / 255.0 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (variance.sqrt() * SHARPNESS_SCALE).min(1.0)
}

fn continuity_score(mask: &GrayImage) -> f64 {
    let (width, height) = mask.dimensions();
    let binary = GrayImage::from_fn(width, height, |x, y| {
        Luma([if mask.get_pixel(x, y).0[0] > 127 { 255 } else { 0 }])
    });
    let areas = component_areas(&binary);
    if areas.len() <= 1 {
        return 1.0;
    }
    let total: u64 = areas.iter().sum();
    let largest = areas.iter().copied().max().unwrap_or(0);
    largest as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> SegmentationMask {
        SegmentationMask::from_image(GrayImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(x0, y0, x1, y1)| x >= x0 && x < x1 && y >= y0 && y < y1);
            Luma([if inside { 255 } else { 0 }])
        }))
    }

    /// Centred square covering about `fraction` of a 100x100 frame
    fn centred_square(fraction: f64) -> SegmentationMask {
        let side = (10_000.0 * fraction).sqrt() as u32;
        let start = (100 - side) / 2;
        mask_with_rects(100, 100, &[(start, start, start + side, start + side)])
    }

    #[test]
    fn test_good_mask_scores_high() {
        let score = ConfidenceScorer::new().score(&centred_square(0.4));
        assert!(score > 0.5, "score {score}");
        assert!(score <= 1.0);
    }

    #[test]
    fn test_small_mask_is_penalized() {
        let score = ConfidenceScorer::new().score(&centred_square(0.02));
        assert!(score < 0.6, "score {score}");
    }

    #[test]
    fn test_fragmented_mask_is_penalized() {
        let mask = mask_with_rects(
            100,
            100,
            &[(10, 10, 30, 30), (50, 50, 70, 70), (75, 10, 95, 30)],
        );
        let breakdown = ConfidenceScorer::new().breakdown(mask.as_image()).unwrap();
        assert!((breakdown.continuity_score - 1.0 / 3.0).abs() < 1e-9);
        assert!(ConfidenceScorer::new().score(&mask) < 0.8);
    }

    #[test]
    fn test_uniform_masks_score_low() {
        let scorer = ConfidenceScorer::new();
        let black = scorer.score(&SegmentationMask::filled(100, 100, 0));
        let white = scorer.score(&SegmentationMask::filled(100, 100, 255));
        assert!(black < 0.5, "black {black}");
        assert!(white < 0.5, "white {white}");
        assert!((black - 0.39).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = ConfidenceScorer::new();
        let mask = centred_square(0.3);
        let first = scorer.score(&mask);
        let second = scorer.score(&mask.clone());
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_ratio_extremes_score_below_moderate() {
        let scorer = ConfidenceScorer::new();
        let good = scorer.score(&centred_square(0.4));
        let small = scorer.score(&centred_square(0.01));
        let large = scorer.score(&centred_square(0.97));
        assert!(good > small);
        assert!(good > large);
    }

    #[test]
    fn test_low_contrast_mask_scores_below_crisp_one() {
        let blob = |foreground: u8, background: u8| {
            GrayImage::from_fn(100, 100, |x, y| {
                let inside = (25..75).contains(&x) && (25..75).contains(&y);
                Luma([if inside { foreground } else { background }])
            })
        };
        let scorer = ConfidenceScorer::new();
        let crisp = scorer.breakdown(&blob(255, 0)).unwrap();
        let soft = scorer.breakdown(&blob(140, 100)).unwrap();

        assert!((crisp.ratio_score - soft.ratio_score).abs() < 1e-12);
        assert!((crisp.continuity_score - soft.continuity_score).abs() < 1e-12);
        assert!(crisp.sharpness_score > soft.sharpness_score);
        assert!(crisp.combined() > soft.combined());
    }

    #[test]
    fn test_grey_mask_has_low_sharpness() {
        let breakdown = ConfidenceScorer::new()
            .breakdown(SegmentationMask::filled(50, 50, 128).as_image())
            .unwrap();
        assert!(breakdown.sharpness_score.abs() < 1e-12);
        assert!((breakdown.ratio_score - IMPLAUSIBLE_RATIO_SCORE).abs() < 1e-12);
    }

    #[test]
    fn test_empty_mask_is_neutral() {
        let empty = SegmentationMask::filled(0, 0, 0);
        assert!(ConfidenceScorer::new().breakdown(empty.as_image()).is_err());
        assert_eq!(ConfidenceScorer::new().score(&empty), NEUTRAL_CONFIDENCE);
    }

    #[test]
    fn test_score_stays_in_unit_interval() {
        let scorer = ConfidenceScorer::new();
        for seed in 0u32..16 {
            let mask = SegmentationMask::from_image(GrayImage::from_fn(40, 30, |x, y| {
                Luma([((x * 31 + y * 17 + seed * 53) % 256) as u8])
            }));
            let score = scorer.score(&mask);
            assert!((0.0..=1.0).contains(&score));
        }
    }
}
