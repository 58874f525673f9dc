//! Shared image and mask utilities

pub mod geometry;
pub mod morphology;
pub mod preprocessing;

pub use geometry::{
    apply_alpha_matting, component_areas, create_smooth_edges, denormalize_mask,
    extract_largest_component, fit_within, normalize_mask, resize_with_aspect_ratio, Trimap,
    TrimapRegion,
};
pub use morphology::{close, dilate, erode, gaussian_blur_odd, open, StructuringElement};
pub use preprocessing::{ImagePreprocessor, PreprocessedInput};
