#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # cutout
//!
//! Background removal for product photography. A dense segmentation model
//! (ONNX, run through Tract or ONNX Runtime) produces a foreground mask, which
//! is refined, scored and composited into the alpha channel of the original
//! image. When no model is available, inference fails, or the model's mask
//! scores below the confidence threshold, a classical segmenter takes over so
//! every decodable image still yields a result.
//!
//! ## Features
//!
//! - **Two backends**: Tract (pure Rust, default) and ONNX Runtime (`onnx` feature)
//! - **Graceful degradation**: fallback segmentation with discounted confidence
//! - **Confidence scoring**: foreground ratio, edge sharpness and connectivity
//! - **Thread-safe sharing**: one loaded model, many concurrent callers
//! - **CLI Integration**: optional command-line interface (`cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout::{SegmentationConfig, SegmentationProcessor};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = SegmentationConfig::builder()
//!     .model_path("models/segmentation.onnx")
//!     .confidence_threshold(0.3)
//!     .build()?;
//! let processor = SegmentationProcessor::new(config)?;
//!
//! let image = image::open("product.jpg")?;
//! let result = processor.remove_background(&image)?;
//! println!(
//!     "{} segmentation, confidence {:.2}",
//!     result.method(),
//!     result.confidence()
//! );
//! std::fs::write("product-cutout.png", result.to_png_bytes()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! The processor is cheap to clone; clones share the loaded model and can be
//! moved to other threads.

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod confidence;
pub mod config;
pub mod error;
pub mod fallback;
pub mod inference;
pub mod postprocessing;
pub mod processor;
pub mod refine;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::{AsyncRead, AsyncReadExt};

// Public API exports
pub use backends::*;
pub use confidence::{ConfidenceScorer, NEUTRAL_CONFIDENCE};
pub use config::{
    BackendType, ExecutionProvider, FallbackConfig, RefinementConfig, SegmentationConfig,
    SegmentationConfigBuilder, MODEL_PATH_ENV,
};
pub use error::{CutoutError, Result};
pub use fallback::FallbackSegmenter;
pub use inference::{InferenceBackend, SharedBackend};
pub use postprocessing::Postprocessor;
pub use processor::{
    BackendFactory, DefaultBackendFactory, PrimaryOutcome, RejectionReason, SegmentationProcessor,
};
pub use refine::MaskRefiner;
pub use types::{
    confidence_message, ConfidenceBreakdown, HealthStatus, ProcessingStage, RemovalSummary,
    SegmentationMask, SegmentationMethod, SegmentationResult,
};
pub use utils::{ImagePreprocessor, PreprocessedInput};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background from a `DynamicImage`
///
/// Builds a [`SegmentationProcessor`] for this one call, which loads the model
/// each time. Services handling more than one image should create a processor
/// once and share it.
///
/// # Examples
///
/// ```rust,no_run
/// use cutout::{remove_background_from_image, SegmentationConfig};
///
/// # async fn example(img: image::DynamicImage) -> anyhow::Result<()> {
/// let config = SegmentationConfig::default().with_env_overrides();
/// let result = remove_background_from_image(img, &config).await?;
/// std::fs::write("output.png", result.to_png_bytes()?)?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_image(
    image: image::DynamicImage,
    config: &SegmentationConfig,
) -> Result<SegmentationResult> {
    let processor = SegmentationProcessor::new(config.clone())?;
    processor.remove_background_async(image).await
}

/// Remove the background from encoded image bytes (JPEG, PNG, WebP, BMP, TIFF)
///
/// # Examples
///
/// ```rust,no_run
/// use cutout::{remove_background_from_bytes, SegmentationConfig};
///
/// # async fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let config = SegmentationConfig::builder()
///     .model_path("models/segmentation.onnx")
///     .build()?;
/// let result = remove_background_from_bytes(&upload_bytes, &config).await?;
/// let summary = result.summary();
/// println!("{}", serde_json::to_string(&summary)?);
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &SegmentationConfig,
) -> Result<SegmentationResult> {
    let processor = SegmentationProcessor::new(config.clone())?;
    processor.process_bytes_async(image_bytes.to_vec()).await
}

/// Remove the background from an async reader stream
///
/// The stream is read to the end before decoding.
///
/// # Examples
///
/// ```rust,no_run
/// use cutout::{remove_background_from_reader, SegmentationConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("product.jpg").await?;
/// let result = remove_background_from_reader(file, &SegmentationConfig::default()).await?;
/// println!("confidence {:.2}", result.confidence());
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: &SegmentationConfig,
) -> Result<SegmentationResult> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer).await?;
    let processor = SegmentationProcessor::new(config.clone())?;
    processor.process_bytes_async(buffer).await
}
