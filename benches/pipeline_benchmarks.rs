use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cutout::{
    backends::MockBackend, ConfidenceScorer, FallbackSegmenter, MaskRefiner, SegmentationConfig,
    SegmentationMask, SegmentationProcessor,
};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

const SIZES: [(u32, u32); 3] = [(320, 240), (800, 600), (1920, 1080)];

fn product_photo(width: u32, height: u32) -> DynamicImage {
    let (x0, y0, x1, y1) = (width / 4, height / 4, width * 3 / 4, height * 3 / 4);
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        if x >= x0 && x < x1 && y >= y0 && y < y1 {
            Rgb([40, 70, 150])
        } else {
            Rgb([245, 245, 245])
        }
    }))
}

fn ragged_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let inside = x > width / 5 && x < width * 4 / 5 && y > height / 5 && y < height * 4 / 5;
        let speck = (x * 31 + y * 17) % 97 == 0;
        Luma([if inside != speck { 255 } else { 0 }])
    })
}

fn bench_config() -> SegmentationConfig {
    SegmentationConfig::builder()
        .input_size(320, 320)
        .warmup(false)
        .build()
        .expect("Benchmark configuration should be valid")
}

fn benchmark_confidence_scoring(c: &mut Criterion) {
    let scorer = ConfidenceScorer::new();
    let mut group = c.benchmark_group("confidence_scoring");
    for (width, height) in SIZES {
        let mask = SegmentationMask::from_image(ragged_mask(width, height));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &mask,
            |b, mask| b.iter(|| black_box(scorer.score(mask))),
        );
    }
    group.finish();
}

fn benchmark_refinement(c: &mut Criterion) {
    let refiner = MaskRefiner::default();
    let mut group = c.benchmark_group("mask_refinement");
    for (width, height) in SIZES {
        let mask = ragged_mask(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &mask,
            |b, mask| b.iter(|| black_box(refiner.refine(mask))),
        );
    }
    group.finish();
}

fn benchmark_fallback(c: &mut Criterion) {
    let segmenter = FallbackSegmenter::new(&bench_config());
    let mut group = c.benchmark_group("fallback_segmentation");
    group.sample_size(20);
    for (width, height) in SIZES {
        let image = product_photo(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| b.iter(|| black_box(segmenter.segment_mask(image))),
        );
    }
    group.finish();
}

fn benchmark_primary_pipeline(c: &mut Criterion) {
    let processor = SegmentationProcessor::with_backend(
        bench_config(),
        Box::new(MockBackend::color_key().with_input_size(320, 320)),
    )
    .expect("Failed to create processor");
    let mut group = c.benchmark_group("remove_background_mock_model");
    group.sample_size(10);
    for (width, height) in SIZES {
        let image = product_photo(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| b.iter(|| black_box(processor.remove_background(image))),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_confidence_scoring,
    benchmark_refinement,
    benchmark_fallback,
    benchmark_primary_pipeline
);
criterion_main!(benches);
