//! Grayscale morphology and smoothing on 8-bit masks

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Flat structuring element, stored as offsets from its anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    size: u32,
    offsets: Vec<(i32, i32)>,
}

impl StructuringElement {
    /// Elliptical element inscribed in a `size x size` square
    ///
    /// Row extents follow the usual raster-ellipse construction, so a 3x3
    /// element is a cross and a 5x5 element is a disc with clipped corners.
    #[must_use]
    pub fn ellipse(size: u32) -> Self {
        let size = size.max(1);
        let radius = (size / 2) as i32;
        if radius == 0 {
            return Self {
                size,
                offsets: vec![(0, 0)],
            };
        }

        let r = f64::from(radius);
        let mut offsets = Vec::new();
        for dy in -radius..=radius {
            let dy_f = f64::from(dy);
            let half_width = (r * ((r * r - dy_f * dy_f) / (r * r)).sqrt()).round() as i32;
            for dx in -half_width..=half_width {
                offsets.push((dx, dy));
            }
        }
        Self { size, offsets }
    }

    /// Full `size x size` square
    #[must_use]
    pub fn square(size: u32) -> Self {
        let size = size.max(1);
        let radius = (size / 2) as i32;
        let offsets = (-radius..=radius)
            .flat_map(|dy| (-radius..=radius).map(move |dx| (dx, dy)))
            .collect();
        Self { size, offsets }
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Offsets `(dx, dy)` covered by the element
    #[must_use]
    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }
}

/// Shared min/max filter; pixels outside the image are ignored
fn rank_filter(mask: &GrayImage, element: &StructuringElement, take_max: bool) -> GrayImage {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as i32, height as i32);
    let raw = mask.as_raw();
    let mut output = GrayImage::new(width, height);

    for y in 0..h {
        for x in 0..w {
            let mut value = if take_max { u8::MIN } else { u8::MAX };
            for &(dx, dy) in element.offsets() {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let sample = raw
                    .get(ny as usize * width as usize + nx as usize)
                    .copied()
                    .unwrap_or(value);
                value = if take_max {
                    value.max(sample)
                } else {
                    value.min(sample)
                };
            }
            output.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    output
}

/// Grayscale dilation (local maximum under the element)
#[must_use]
pub fn dilate(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    rank_filter(mask, element, true)
}

/// Grayscale erosion (local minimum under the element)
#[must_use]
pub fn erode(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    rank_filter(mask, element, false)
}

/// Dilate then erode: fills holes smaller than the element
#[must_use]
pub fn close(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    erode(&dilate(mask, element), element)
}

/// Erode then dilate: removes specks smaller than the element
#[must_use]
pub fn open(mask: &GrayImage, element: &StructuringElement) -> GrayImage {
    dilate(&erode(mask, element), element)
}

/// Standard deviation implied by an odd Gaussian kernel size
#[must_use]
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size.max(1) as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian blur parameterized by an odd kernel size instead of a sigma
#[must_use]
pub fn gaussian_blur_odd(image: &GrayImage, kernel_size: u32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 || kernel_size <= 1 {
        return image.clone();
    }
    gaussian_blur_f32(image, sigma_for_kernel(kernel_size))
}
