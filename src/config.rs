//! Configuration types for segmentation operations

use crate::error::{CutoutError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the model file
pub const MODEL_PATH_ENV: &str = "MODEL_PATH";

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Tract backend (pure Rust, no external dependencies)
    #[default]
    Tract,
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Kernel sizes used by the mask refiner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Gaussian smoothing kernel (odd)
    pub blur_kernel: u32,
    /// Elliptical structuring element for hole-filling closing (odd)
    pub close_kernel: u32,
    /// Elliptical structuring element for speck-removing opening (odd)
    pub open_kernel: u32,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 3,
            close_kernel: 5,
            open_kernel: 3,
        }
    }
}

/// Parameters of the classical thresholding path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Gaussian noise-reduction kernel applied to the grayscale image (odd)
    pub blur_kernel: u32,
    /// Side of the local-mean neighbourhood for adaptive thresholding (odd)
    pub block_size: u32,
    /// Constant subtracted from the local mean before comparison
    pub offset: i16,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            block_size: 11,
            offset: 2,
        }
    }
}

/// Configuration for the segmentation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Path to the model file; `None` runs in fallback-only mode
    pub model_path: Option<PathBuf>,

    /// Inference backend used to run the model
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Fixed model input size as (width, height)
    pub input_size: (u32, u32),

    /// Images whose larger side exceeds this are downscaled before anything else
    pub max_dimension: u32,

    /// Images whose larger side exceeds this release intermediate buffers eagerly
    pub large_image_threshold: u32,

    /// Primary results scoring below this are rerouted to the fallback path
    pub confidence_threshold: f64,

    /// Multiplier applied to the fallback path's confidence
    pub fallback_confidence_factor: f64,

    /// Run one inference on a zero tensor right after loading the model
    pub warmup: bool,

    /// Mask refinement kernels
    pub refinement: RefinementConfig,

    /// Classical fallback parameters
    pub fallback: FallbackConfig,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            input_size: (1024, 1024),
            max_dimension: 4096,
            large_image_threshold: 2048,
            confidence_threshold: 0.3,
            fallback_confidence_factor: 0.6,
            warmup: true,
            refinement: RefinementConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl SegmentationConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> SegmentationConfigBuilder {
        SegmentationConfigBuilder::new()
    }

    /// Load a configuration from a JSON file; absent fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CutoutError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config '{}': {}", path.display(), e),
            ))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill `model_path` from the `MODEL_PATH` environment variable when it is set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(MODEL_PATH_ENV) {
            if !path.is_empty() {
                self.model_path = Some(PathBuf::from(path));
            }
        }
        self
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.input_size.0 == 0 || self.input_size.1 == 0 {
            return Err(CutoutError::config_value_error(
                "input_size",
                format!("{}x{}", self.input_size.0, self.input_size.1),
                ">= 1x1",
            ));
        }
        if self.max_dimension == 0 {
            return Err(CutoutError::config_value_error(
                "max_dimension",
                self.max_dimension,
                ">= 1",
            ));
        }
        validate_unit_interval("confidence_threshold", self.confidence_threshold)?;
        validate_unit_interval(
            "fallback_confidence_factor",
            self.fallback_confidence_factor,
        )?;

        validate_kernel("refinement.blur_kernel", self.refinement.blur_kernel)?;
        validate_kernel("refinement.close_kernel", self.refinement.close_kernel)?;
        validate_kernel("refinement.open_kernel", self.refinement.open_kernel)?;
        validate_kernel("fallback.blur_kernel", self.fallback.blur_kernel)?;
        validate_kernel("fallback.block_size", self.fallback.block_size)?;
        if self.fallback.block_size < 3 {
            return Err(CutoutError::config_value_error(
                "fallback.block_size",
                self.fallback.block_size,
                "odd values >= 3",
            ));
        }
        if !(-255..=255).contains(&self.fallback.offset) {
            return Err(CutoutError::config_value_error(
                "fallback.offset",
                self.fallback.offset,
                "-255..=255",
            ));
        }

        Ok(())
    }
}

fn validate_unit_interval(parameter: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CutoutError::config_value_error(parameter, value, "0.0-1.0"))
    }
}

fn validate_kernel(parameter: &str, size: u32) -> Result<()> {
    if size % 2 == 1 {
        Ok(())
    } else {
        Err(CutoutError::config_value_error(
            parameter,
            size,
            "odd values >= 1",
        ))
    }
}

/// Builder for `SegmentationConfig`
#[derive(Debug, Default)]
pub struct SegmentationConfigBuilder {
    config: SegmentationConfig,
}

impl SegmentationConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SegmentationConfig::default(),
        }
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn input_size(mut self, width: u32, height: u32) -> Self {
        self.config.input_size = (width, height);
        self
    }

    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    #[must_use]
    pub fn large_image_threshold(mut self, threshold: u32) -> Self {
        self.config.large_image_threshold = threshold;
        self
    }

    #[must_use]
    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    #[must_use]
    pub fn fallback_confidence_factor(mut self, factor: f64) -> Self {
        self.config.fallback_confidence_factor = factor;
        self
    }

    #[must_use]
    pub fn warmup(mut self, warmup: bool) -> Self {
        self.config.warmup = warmup;
        self
    }

    #[must_use]
    pub fn refinement(mut self, refinement: RefinementConfig) -> Self {
        self.config.refinement = refinement;
        self
    }

    #[must_use]
    pub fn fallback(mut self, fallback: FallbackConfig) -> Self {
        self.config.fallback = fallback;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `CutoutError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<SegmentationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
