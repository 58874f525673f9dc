//! Resizing, normalization and connected-component helpers shared by the
//! pipeline stages and usable on their own.

use super::morphology::{dilate, erode, gaussian_blur_odd, StructuringElement};
use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::Array2;

/// Dimensions scaled down uniformly so the larger side equals `max_dimension`
///
/// Returns `None` when the image already fits.
#[must_use]
pub fn fit_within(dimensions: (u32, u32), max_dimension: u32) -> Option<(u32, u32)> {
    let (width, height) = dimensions;
    let largest = width.max(height);
    if largest <= max_dimension || largest == 0 {
        return None;
    }
    let scale = f64::from(max_dimension) / f64::from(largest);
    let new_width = ((f64::from(width) * scale) as u32).max(1);
    let new_height = ((f64::from(height) * scale) as u32).max(1);
    Some((new_width, new_height))
}

/// Resize to fit inside `target` while keeping the aspect ratio (Lanczos)
#[must_use]
pub fn resize_with_aspect_ratio(image: &DynamicImage, target: (u32, u32)) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let scale = (f64::from(target.0) / f64::from(width)).min(f64::from(target.1) / f64::from(height));
    let new_width = ((f64::from(width) * scale) as u32).max(1);
    let new_height = ((f64::from(height) * scale) as u32).max(1);
    image.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Mask intensities mapped to `[0, 1]`, indexed `[row, column]`
#[must_use]
pub fn normalize_mask(mask: &GrayImage) -> Array2<f32> {
    let (width, height) = mask.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        f32::from(mask.get_pixel(x as u32, y as u32).0[0]) / 255.0
    })
}

/// Inverse of [`normalize_mask`]; values are clamped then truncated
#[must_use]
pub fn denormalize_mask(values: &Array2<f32>) -> GrayImage {
    let (height, width) = values.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let value = values
            .get((y as usize, x as usize))
            .copied()
            .unwrap_or(0.0);
        Luma([(value.clamp(0.0, 1.0) * 255.0) as u8])
    })
}

/// Pixel areas of the 8-connected non-zero components, in label order
#[must_use]
pub fn component_areas(binary: &GrayImage) -> Vec<u64> {
    let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));
    label_areas(&labels)
}

fn label_areas(labels: &ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<u64> {
    let mut areas: Vec<u64> = Vec::new();
    for label in labels.pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if areas.len() < label {
            areas.resize(label, 0);
        }
        if let Some(area) = areas.get_mut(label - 1) {
            *area += 1;
        }
    }
    areas
}

/// Keep only the largest 8-connected non-zero component, set to 255
#[must_use]
pub fn extract_largest_component(mask: &GrayImage) -> GrayImage {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let areas = label_areas(&labels);
    if areas.is_empty() {
        return mask.clone();
    }

    // First maximum wins
    let mut largest_label = 1u32;
    let mut largest_area = 0u64;
    for (index, &area) in areas.iter().enumerate() {
        if area > largest_area {
            largest_area = area;
            largest_label = index as u32 + 1;
        }
    }

    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if labels.get_pixel(x, y).0[0] == largest_label {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Feather mask edges with a Gaussian of kernel `2 * feather_amount + 1`
#[must_use]
pub fn create_smooth_edges(mask: &GrayImage, feather_amount: u32) -> GrayImage {
    if feather_amount == 0 {
        return mask.clone();
    }
    gaussian_blur_odd(mask, feather_amount * 2 + 1)
}

/// Region of a trimap pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimapRegion {
    Foreground,
    Background,
    Unknown,
}

/// Three-way partition of a mask into sure foreground, sure background and
/// an unknown band around the edges
#[derive(Debug, Clone)]
pub struct Trimap {
    width: u32,
    height: u32,
    regions: Vec<TrimapRegion>,
}

impl Trimap {
    /// Build a trimap from the binarized mask: pixels that survive an erosion
    /// by an elliptical element of `erosion` pixels are sure foreground, pixels
    /// a dilation does not reach are sure background, the band between is
    /// unknown
    #[must_use]
    pub fn from_mask(mask: &GrayImage, erosion: u32) -> Self {
        let element = StructuringElement::ellipse(erosion);
        let (width, height) = mask.dimensions();
        let binary = GrayImage::from_fn(width, height, |x, y| {
            Luma([if mask.get_pixel(x, y).0[0] > 127 { 255 } else { 0 }])
        });
        let sure_foreground = erode(&binary, &element);
        let reachable = dilate(&binary, &element);

        let regions = sure_foreground
            .as_raw()
            .iter()
            .zip(reachable.as_raw())
            .map(|(&fg, &reach)| {
                if fg > 0 {
                    TrimapRegion::Foreground
                } else if reach == 0 {
                    TrimapRegion::Background
                } else {
                    TrimapRegion::Unknown
                }
            })
            .collect();

        Self {
            width,
            height,
            regions,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Region at (x, y), `None` when out of bounds
    #[must_use]
    pub fn region(&self, x: u32, y: u32) -> Option<TrimapRegion> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.regions
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Number of pixels in the unknown band
    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.regions
            .iter()
            .filter(|&&r| r == TrimapRegion::Unknown)
            .count()
    }
}

/// Simple alpha matting: keep mask alpha in the sure regions and set the
/// unknown band to half opacity
#[must_use]
pub fn apply_alpha_matting(mask: &GrayImage, trimap_erosion: u32) -> GrayImage {
    let trimap = Trimap::from_mask(mask, trimap_erosion);
    let (width, height) = mask.dimensions();
    GrayImage::from_fn(width, height, |x, y| match trimap.region(x, y) {
        Some(TrimapRegion::Unknown) => Luma([127]),
        _ => *mask.get_pixel(x, y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn rect_mask(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(x0, y0, x1, y1)| x >= x0 && x < x1 && y >= y0 && y < y1);
            Luma([if inside { 255 } else { 0 }])
        })
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within((800, 600), 4096), None);
        assert_eq!(fit_within((8192, 4096), 4096), Some((4096, 2048)));
        assert_eq!(fit_within((3000, 6000), 4096), Some((2048, 4096)));
        assert_eq!(fit_within((5000, 1), 4096), Some((4096, 1)));
    }

    #[test]
    fn test_resize_with_aspect_ratio() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 600, Rgb([10, 20, 30])));
        let resized = resize_with_aspect_ratio(&image, (400, 400));
        assert_eq!(resized.dimensions(), (400, 300));

        let tall = DynamicImage::ImageRgb8(RgbImage::new(100, 400));
        assert_eq!(resize_with_aspect_ratio(&tall, (200, 200)).dimensions(), (50, 200));
    }

    #[test]
    fn test_normalize_roundtrip() {
        let mask = GrayImage::from_fn(7, 3, |x, y| Luma([(x * 30 + y) as u8]));
        let normalized = normalize_mask(&mask);
        assert_eq!(normalized.dim(), (3, 7));
        assert!(normalized.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(normalized[[0, 0]], 0.0);

        let restored = denormalize_mask(&normalized);
        for (a, b) in restored.as_raw().iter().zip(mask.as_raw()) {
            assert!(a.abs_diff(*b) <= 1);
        }
    }

    #[test]
    fn test_component_areas() {
        let mask = rect_mask(20, 20, &[(0, 0, 3, 3), (10, 10, 15, 14)]);
        let mut areas = component_areas(&mask);
        areas.sort_unstable();
        assert_eq!(areas, vec![9, 20]);

        // Diagonal neighbours join under 8-connectivity
        let diagonal = rect_mask(4, 4, &[(0, 0, 1, 1), (1, 1, 2, 2)]);
        assert_eq!(component_areas(&diagonal), vec![2]);

        assert!(component_areas(&GrayImage::new(5, 5)).is_empty());
    }

    #[test]
    fn test_extract_largest_component() {
        let mask = rect_mask(30, 30, &[(0, 0, 3, 3), (10, 10, 20, 20)]);
        let largest = extract_largest_component(&mask);
        assert_eq!(largest.get_pixel(1, 1).0[0], 0);
        assert_eq!(largest.get_pixel(15, 15).0[0], 255);
        assert_eq!(component_areas(&largest), vec![100]);
    }

    #[test]
    fn test_single_grey_component_is_saturated() {
        let mask = GrayImage::from_fn(20, 20, |x, y| {
            let inside = (5..15).contains(&x) && (5..15).contains(&y);
            Luma([if inside { 200 } else { 0 }])
        });
        let largest = extract_largest_component(&mask);
        assert_eq!(largest.get_pixel(10, 10).0[0], 255);
        assert_eq!(largest.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn test_trimap_and_matting() {
        let mask = rect_mask(40, 40, &[(10, 10, 30, 30)]);
        let trimap = Trimap::from_mask(&mask, 5);
        assert_eq!(trimap.region(20, 20), Some(TrimapRegion::Foreground));
        assert_eq!(trimap.region(2, 2), Some(TrimapRegion::Background));
        assert_eq!(trimap.region(10, 20), Some(TrimapRegion::Unknown));
        assert_eq!(trimap.region(9, 20), Some(TrimapRegion::Unknown));
        assert_eq!(trimap.region(40, 0), None);
        assert!(trimap.unknown_count() > 0);

        let matted = apply_alpha_matting(&mask, 5);
        assert_eq!(matted.get_pixel(20, 20).0[0], 255);
        assert_eq!(matted.get_pixel(2, 2).0[0], 0);
        assert_eq!(matted.get_pixel(10, 20).0[0], 127);
    }

    #[test]
    fn test_create_smooth_edges() {
        let mask = rect_mask(20, 20, &[(5, 5, 15, 15)]);
        assert_eq!(create_smooth_edges(&mask, 0), mask);

        let smoothed = create_smooth_edges(&mask, 2);
        let edge = smoothed.get_pixel(5, 10).0[0];
        assert!(edge > 0 && edge < 255);
        assert!(smoothed.get_pixel(10, 10).0[0] >= 250);
    }
}
