//! Segmentation orchestrator
//!
//! [`SegmentationProcessor`] owns the dual-path strategy: the primary attempt
//! (preprocess, infer, postprocess, score) produces a [`PrimaryOutcome`], and
//! anything other than an accepted mask is handed to the
//! [`FallbackSegmenter`]. Only decode and fallback failures ever reach the
//! caller.

use crate::{
    config::{BackendType, SegmentationConfig},
    confidence::ConfidenceScorer,
    error::{CutoutError, Result},
    fallback::FallbackSegmenter,
    inference::{InferenceBackend, SharedBackend},
    postprocessing::Postprocessor,
    refine::MaskRefiner,
    types::{
        HealthStatus, ProcessingStage, SegmentationMask, SegmentationMethod, SegmentationResult,
    },
    utils::ImagePreprocessor,
};
use image::{DynamicImage, GenericImageView};
use instant::Instant;
use log::{debug, info, warn};
use tracing::{instrument, trace};

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend for the configured model
    ///
    /// # Errors
    ///
    /// Returns `CutoutError` for:
    /// - No model configured, or the backend type compiled out
    /// - Model loading errors
    fn create_backend(&self, config: &SegmentationConfig) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Builds Tract or ONNX Runtime backends from `model_path`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(&self, config: &SegmentationConfig) -> Result<Box<dyn InferenceBackend>> {
        let path = config
            .model_path
            .as_deref()
            .ok_or_else(|| CutoutError::backend_unavailable("No model path configured"))?;

        match config.backend_type {
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::from_path(
                path,
                config.input_size,
            )?)),
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::from_path(
                path, config,
            )?)),
            #[allow(unreachable_patterns)]
            other => Err(CutoutError::backend_unavailable(format!(
                "{} backend is not compiled in; enable the '{}' feature",
                other, other
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        backends
    }
}

/// Why a primary attempt was not used
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// No backend is loaded
    BackendUnavailable,
    /// The backend failed or its output could not be turned into a mask
    InferenceFailure(String),
    /// The mask scored below the configured trust threshold
    LowConfidence(f64),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackendUnavailable => write!(f, "inference backend unavailable"),
            Self::InferenceFailure(message) => write!(f, "inference failed: {}", message),
            Self::LowConfidence(confidence) => write!(f, "low confidence ({:.3})", confidence),
        }
    }
}

/// Result of the primary (model) path
#[derive(Debug, Clone)]
pub enum PrimaryOutcome {
    Accepted {
        mask: SegmentationMask,
        confidence: f64,
        was_downsampled: bool,
    },
    Rejected(RejectionReason),
}

impl PrimaryOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Background removal with a learned model and a classical fallback
///
/// Cheap to clone; clones share the loaded backend. All methods take `&self`,
/// so one processor can serve many threads at once.
#[derive(Debug, Clone)]
pub struct SegmentationProcessor {
    config: SegmentationConfig,
    backend: Option<SharedBackend>,
    preprocessor: ImagePreprocessor,
    postprocessor: Postprocessor,
    scorer: ConfidenceScorer,
    fallback: FallbackSegmenter,
}

impl SegmentationProcessor {
    /// Create a processor, loading the model with the default backend factory
    ///
    /// A model that fails to load leaves the processor in fallback-only mode.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: SegmentationConfig) -> Result<Self> {
        Self::with_factory(config, &DefaultBackendFactory)
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(config: SegmentationConfig, factory: &dyn BackendFactory) -> Result<Self> {
        config.validate()?;
        let backend = Self::load_backend(&config, factory);
        Ok(Self::assemble(config, backend))
    }

    /// Create a processor around an already constructed backend
    ///
    /// Runs the warm-up inference when the configuration asks for it.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_backend(
        config: SegmentationConfig,
        backend: Box<dyn InferenceBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let shared = SharedBackend::new(backend);
        if config.warmup {
            shared.warmup();
        }
        Ok(Self::assemble(config, Some(shared)))
    }

    /// Create a processor that always uses the fallback path
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn without_backend(config: SegmentationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, None))
    }

    /// Load the configured backend, logging instead of failing
    #[must_use]
    pub fn load_backend(
        config: &SegmentationConfig,
        factory: &dyn BackendFactory,
    ) -> Option<SharedBackend> {
        if config.model_path.is_none() {
            info!("No model configured; running in fallback-only mode");
            return None;
        }

        match factory.create_backend(config) {
            Ok(backend) => {
                let shared = SharedBackend::new(backend);
                info!("Loaded {} inference backend", shared.name());
                if config.warmup {
                    shared.warmup();
                }
                Some(shared)
            }
            Err(e) => {
                warn!("Model loading failed, running in fallback-only mode: {}", e);
                None
            }
        }
    }

    fn assemble(config: SegmentationConfig, backend: Option<SharedBackend>) -> Self {
        Self {
            preprocessor: ImagePreprocessor::new(&config),
            postprocessor: Postprocessor::new(MaskRefiner::new(config.refinement)),
            scorer: ConfidenceScorer::new(),
            fallback: FallbackSegmenter::new(&config),
            backend,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Whether an inference backend is loaded
    #[must_use]
    pub fn backend_loaded(&self) -> bool {
        self.backend.is_some()
    }

    #[must_use]
    pub fn health(&self) -> HealthStatus {
        HealthStatus::new(self.backend_loaded())
    }

    /// Remove the background from an image
    ///
    /// Always returns a complete result unless the image has no pixels or
    /// the fallback path itself fails.
    ///
    /// # Errors
    /// - `CutoutError::Decode` for an image with zero width or height
    /// - `CutoutError::Fallback` when the classical path cannot produce a mask
    #[instrument(
        skip(self, image),
        fields(
            backend = self.backend.as_ref().map_or("none", SharedBackend::name),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn remove_background(&self, image: &DynamicImage) -> Result<SegmentationResult> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CutoutError::decode(format!(
                "Image has no pixels ({}x{})",
                width, height
            )));
        }
        let large = width.max(height) > self.config.large_image_threshold;

        let result = match self.run_primary(image) {
            PrimaryOutcome::Accepted {
                mask,
                confidence,
                was_downsampled,
            } => {
                enter_stage(ProcessingStage::Compositing);
                match mask.composite(image) {
                    Ok(composited) => SegmentationResult::new(
                        composited,
                        mask,
                        confidence,
                        start.elapsed().as_secs_f64(),
                        SegmentationMethod::Primary,
                        was_downsampled,
                    ),
                    Err(e) => {
                        warn!("Compositing the primary mask failed, using fallback: {}", e);
                        self.fallback.fallback_segment(image, start)?
                    }
                }
            }
            PrimaryOutcome::Rejected(reason) => {
                match &reason {
                    RejectionReason::BackendUnavailable => {
                        enter_stage(ProcessingStage::ModelUnavailable);
                        debug!("No backend loaded, using fallback segmentation");
                    }
                    RejectionReason::InferenceFailure(message) => {
                        warn!("Primary segmentation failed, using fallback: {}", message);
                    }
                    RejectionReason::LowConfidence(confidence) => {
                        enter_stage(ProcessingStage::LowConfidenceRetry);
                        warn!(
                            "Low confidence ({:.3}) from model, using fallback",
                            confidence
                        );
                    }
                }
                self.fallback.fallback_segment(image, start)?
            }
        };

        if large {
            debug!(
                "Large image ({}x{}) processed above the {}px threshold",
                width, height, self.config.large_image_threshold
            );
        }
        enter_stage(ProcessingStage::Done);
        info!(
            "Segmentation done: method={}, confidence={:.3}, time={:.3}s",
            result.method(),
            result.confidence(),
            result.processing_time()
        );
        Ok(result)
    }

    /// Run the model path and decide whether its mask can be trusted
    #[must_use]
    pub fn run_primary(&self, image: &DynamicImage) -> PrimaryOutcome {
        let Some(backend) = self.backend.as_ref() else {
            return PrimaryOutcome::Rejected(RejectionReason::BackendUnavailable);
        };

        let (mask, was_downsampled) = match self.infer_mask(backend, image) {
            Ok(output) => output,
            Err(e) => {
                return PrimaryOutcome::Rejected(RejectionReason::InferenceFailure(e.to_string()))
            }
        };

        enter_stage(ProcessingStage::Scoring);
        let confidence = self.scorer.score(&mask);
        if confidence < self.config.confidence_threshold {
            return PrimaryOutcome::Rejected(RejectionReason::LowConfidence(confidence));
        }

        enter_stage(ProcessingStage::Accepted);
        PrimaryOutcome::Accepted {
            mask,
            confidence,
            was_downsampled,
        }
    }

    fn infer_mask(
        &self,
        backend: &SharedBackend,
        image: &DynamicImage,
    ) -> Result<(SegmentationMask, bool)> {
        enter_stage(ProcessingStage::Preprocessing);
        let input = self.preprocessor.preprocess(image)?;
        let original_size = input.original_size;
        let was_downsampled = input.was_downsampled;

        enter_stage(ProcessingStage::Inferring);
        let raw_output = backend.run_inference(&input.tensor)?;
        drop(input);

        enter_stage(ProcessingStage::Postprocessing);
        let mask = self.postprocessor.postprocess(&raw_output, original_size)?;
        drop(raw_output);

        Ok((mask, was_downsampled))
    }

    /// Decode image bytes and remove the background
    ///
    /// # Errors
    /// - `CutoutError::Decode` when the bytes are not a supported image
    /// - Any terminal error of [`Self::remove_background`]
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<SegmentationResult> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| CutoutError::decode(e.to_string()))?;
        self.remove_background(&image)
    }

    /// [`Self::process_bytes`] on the blocking thread pool
    ///
    /// # Errors
    /// - Same as [`Self::process_bytes`], or the blocking task panicked
    pub async fn process_bytes_async(&self, image_bytes: Vec<u8>) -> Result<SegmentationResult> {
        let processor = self.clone();
        tokio::task::spawn_blocking(move || processor.process_bytes(&image_bytes))
            .await
            .map_err(|e| CutoutError::processing(format!("Processing task failed: {}", e)))?
    }

    /// [`Self::remove_background`] on the blocking thread pool
    ///
    /// # Errors
    /// - Same as [`Self::remove_background`], or the blocking task panicked
    pub async fn remove_background_async(&self, image: DynamicImage) -> Result<SegmentationResult> {
        let processor = self.clone();
        tokio::task::spawn_blocking(move || processor.remove_background(&image))
            .await
            .map_err(|e| CutoutError::processing(format!("Processing task failed: {}", e)))?
    }
}

fn enter_stage(stage: ProcessingStage) {
    trace!(stage = stage.description(), "stage");
}
