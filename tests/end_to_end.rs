//! Full pipeline behaviour on synthetic product photos

mod common;

use common::{encode_png, fast_config, framed_rect};
use cutout::{
    backends::MockBackend, ConfidenceScorer, SegmentationMethod, SegmentationProcessor,
};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

#[test]
fn test_centered_product_is_segmented_with_high_confidence() {
    // 490x392 covers 40% of an 800x600 frame
    let image = framed_rect(800, 600, (155, 104, 490, 392), [240, 240, 240], [30, 60, 160]);
    let processor = SegmentationProcessor::with_backend(
        fast_config(),
        Box::new(MockBackend::color_key().with_input_size(256, 256)),
    )
    .expect("Failed to create processor");

    let result = processor.remove_background(&image).expect("Segmentation failed");

    assert_eq!(result.method(), SegmentationMethod::Primary);
    assert!(result.confidence() > 0.5, "confidence {}", result.confidence());
    assert_eq!(result.dimensions(), (800, 600));

    let (x0, y0, x1, y1) = result.mask().bounding_box(127).expect("Mask should not be empty");
    let tolerance = 8;
    assert!(x0.abs_diff(155) <= tolerance, "left edge {x0}");
    assert!(y0.abs_diff(104) <= tolerance, "top edge {y0}");
    assert!(x1.abs_diff(644) <= tolerance, "right edge {x1}");
    assert!(y1.abs_diff(495) <= tolerance, "bottom edge {y1}");

    // Background pixels end up transparent, product pixels opaque
    assert!(result.image().get_pixel(20, 20).0[3] < 16);
    assert!(result.image().get_pixel(400, 300).0[3] > 240);
}

#[test]
fn test_blank_image_scores_low_through_fallback() {
    let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        800,
        600,
        image::Rgb([255, 255, 255]),
    ));
    let processor =
        SegmentationProcessor::without_backend(fast_config()).expect("Failed to create processor");

    let result = processor.remove_background(&image).expect("Segmentation failed");

    assert_eq!(result.method(), SegmentationMethod::Fallback);
    assert!(result.confidence() < 0.5, "confidence {}", result.confidence());
    assert!(!result.was_downsampled());
}

#[test]
fn test_tiny_subject_is_penalized() {
    let image = framed_rect(800, 600, (380, 280, 40, 40), [255, 255, 255], [0, 0, 0]);
    let processor = SegmentationProcessor::with_backend(
        fast_config(),
        Box::new(MockBackend::color_key().with_input_size(256, 256)),
    )
    .expect("Failed to create processor");

    let result = processor.remove_background(&image).expect("Segmentation failed");
    assert!(result.confidence() < 0.6, "confidence {}", result.confidence());

    // The same penalty applies to a mask scored directly
    let mask = GrayImage::from_fn(800, 600, |x, y| {
        let inside = (380..420).contains(&x) && (280..320).contains(&y);
        Luma([if inside { 255 } else { 0 }])
    });
    let breakdown = ConfidenceScorer::new()
        .breakdown(&mask)
        .expect("Mask is not empty");
    assert!((breakdown.ratio_score - 0.3).abs() < f64::EPSILON);
    assert!(breakdown.combined() < 0.6);
}

#[test]
fn test_missing_backend_never_fails_on_decodable_images() {
    let processor =
        SegmentationProcessor::without_backend(fast_config()).expect("Failed to create processor");
    assert_eq!(processor.health().status, "degraded");

    let gradient = DynamicImage::ImageLuma8(GrayImage::from_fn(64, 48, |x, y| {
        Luma([((x * 4 + y) % 256) as u8])
    }));
    let transparent = DynamicImage::ImageRgba8(RgbaImage::from_fn(50, 50, |x, _| {
        Rgba([200, 10, 10, if x < 25 { 0 } else { 255 }])
    }));
    let product = framed_rect(320, 240, (100, 60, 120, 120), [250, 250, 250], [10, 10, 10]);
    let noisy = DynamicImage::ImageRgb8(image::RgbImage::from_fn(97, 31, |x, y| {
        let v = ((x * 7919 + y * 104_729) % 251) as u8;
        image::Rgb([v, v.wrapping_mul(3), v.wrapping_add(91)])
    }));

    for image in [gradient, transparent, product, noisy] {
        let (width, height) = (image.width(), image.height());
        let result = processor
            .remove_background(&image)
            .expect("Fallback should always produce a result");
        assert_eq!(result.method(), SegmentationMethod::Fallback);
        assert_eq!(result.dimensions(), (width, height));
        assert_eq!(result.mask().dimensions(), (width, height));
        assert!((0.0..=1.0).contains(&result.confidence()));
    }
}

#[test]
fn test_failing_backend_still_yields_result_from_bytes() {
    let bytes = encode_png(&framed_rect(
        200,
        150,
        (50, 40, 100, 70),
        [255, 255, 255],
        [0, 0, 0],
    ));
    let processor = SegmentationProcessor::with_backend(
        fast_config(),
        Box::new(MockBackend::failing("device lost").with_input_size(256, 256)),
    )
    .expect("Failed to create processor");

    let result = processor.process_bytes(&bytes).expect("Fallback should take over");
    assert_eq!(result.method(), SegmentationMethod::Fallback);

    let summary = result.summary();
    assert!(summary.success);
    assert_eq!((summary.width, summary.height), (200, 150));
    let json = serde_json::to_value(&summary).expect("Summary should serialize");
    assert_eq!(json["method"], "fallback");
}

#[test]
fn test_large_image_is_downsampled_before_inference() {
    let config = cutout::SegmentationConfig::builder()
        .input_size(128, 128)
        .max_dimension(1024)
        .warmup(false)
        .build()
        .expect("Valid configuration");
    let image = framed_rect(2400, 1200, (600, 300, 1200, 600), [255, 255, 255], [0, 0, 0]);
    let processor = SegmentationProcessor::with_backend(
        config,
        Box::new(MockBackend::color_key().with_input_size(128, 128)),
    )
    .expect("Failed to create processor");

    let result = processor.remove_background(&image).expect("Segmentation failed");
    assert_eq!(result.method(), SegmentationMethod::Primary);
    assert!(result.was_downsampled());
    assert_eq!(result.mask().dimensions(), (2400, 1200));
}
