//! ONNX Runtime backend with optional hardware acceleration
//!
//! Execution providers are picked from [`ExecutionProvider`]: `Auto` tries CUDA,
//! then `CoreML`, and settles for CPU when neither is available. A requested
//! provider that is missing also degrades to CPU with a warning.

use crate::{
    config::{ExecutionProvider, SegmentationConfig},
    error::{CutoutError, Result},
    inference::InferenceBackend,
};
use instant::Instant;
use ndarray::{Array4, ArrayD};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Session,
    input_shape: (usize, usize, usize, usize),
}

impl OnnxBackend {
    /// Create a session for the model at `path`
    ///
    /// # Errors
    /// - The file is missing or ONNX Runtime rejects it
    /// - Session options cannot be applied
    pub fn from_path<P: AsRef<Path>>(path: P, config: &SegmentationConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CutoutError::model(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let start = Instant::now();
        log::info!(
            "Loading ONNX Runtime model from {} (provider: {})",
            path.display(),
            config.execution_provider
        );

        let mut builder = Session::builder()
            .map_err(|e| CutoutError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| CutoutError::model(format!("Failed to set optimization level: {e}")))?;

        let providers = Self::select_providers(config.execution_provider);
        if !providers.is_empty() {
            builder = builder.with_execution_providers(providers).map_err(|e| {
                CutoutError::model(format!("Failed to set execution providers: {e}"))
            })?;
        }

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let session = builder
            .with_intra_threads(intra_threads)
            .map_err(|e| CutoutError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_file(path)
            .map_err(|e| CutoutError::model(format!("Failed to create session: {e}")))?;

        log::info!(
            "ONNX Runtime backend ready in {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );

        let (width, height) = config.input_size;
        Ok(Self {
            session,
            input_shape: (1, 3, height as usize, width as usize),
        })
    }

    fn select_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda_available = || {
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
        };
        let coreml_available = || {
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false)
        };

        let mut providers = Vec::new();
        match requested {
            ExecutionProvider::Cpu => {}
            ExecutionProvider::Auto => {
                if cuda_available() {
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
            }
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    providers.push(CUDAExecutionProvider::default().build());
                } else {
                    log::warn!("CUDA execution provider requested but not available, using CPU");
                }
            }
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    log::warn!("CoreML execution provider requested but not available, using CPU");
                }
            }
        }
        providers
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        log::debug!("Running ONNX Runtime inference on {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| CutoutError::inference(format!("Failed to convert input tensor: {e}")))?;

        // Positional inputs and outputs avoid depending on tensor names
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| CutoutError::inference(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .map(ToString::to_string)
            .ok_or_else(|| CutoutError::inference("No output tensors found"))?;
        let output = outputs
            .get(first_key.as_str())
            .ok_or_else(|| CutoutError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| CutoutError::inference(format!("Failed to extract output tensor: {e}")))?
            .to_owned();
        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.input_shape
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
