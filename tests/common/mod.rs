//! Shared test image builders

#![allow(dead_code)]

use cutout::SegmentationConfig;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
use std::io::Cursor;

/// Solid background with one filled rectangle at `(x, y, width, height)`
pub fn framed_rect(
    width: u32,
    height: u32,
    rect: (i32, i32, u32, u32),
    background: [u8; 3],
    foreground: [u8; 3],
) -> DynamicImage {
    let mut canvas = RgbImage::from_pixel(width, height, Rgb(background));
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(rect.0, rect.1).of_size(rect.2, rect.3),
        Rgb(foreground),
    );
    DynamicImage::ImageRgb8(canvas)
}

pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("Failed to encode test PNG");
    buffer.into_inner()
}

/// Small model input so mock-backed runs stay fast
pub fn fast_config() -> SegmentationConfig {
    SegmentationConfig::builder()
        .input_size(256, 256)
        .warmup(false)
        .build()
        .expect("Test configuration should be valid")
}
