//! Tract backend: pure Rust ONNX inference
//!
//! Needs no native libraries, which makes it the default backend. The model
//! is loaded once, pinned to a `(1, 3, H, W)` input fact and optimized.

use crate::{
    error::{CutoutError, Result},
    inference::InferenceBackend,
};
use instant::Instant;
use ndarray::{Array4, ArrayD};
use std::path::Path;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: TractModel,
    input_shape: (usize, usize, usize, usize),
}

impl TractBackend {
    /// Load an ONNX model from disk for an input of `input_size` (width, height)
    ///
    /// # Errors
    /// - The file is missing or is not a loadable ONNX model
    /// - The model cannot be typed for the given input shape
    pub fn from_path<P: AsRef<Path>>(path: P, input_size: (u32, u32)) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CutoutError::model(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let start = Instant::now();
        let (width, height) = (input_size.0 as usize, input_size.1 as usize);
        log::info!("Loading Tract model from {}", path.display());

        let model = onnx()
            .model_for_path(path)
            .map_err(|e| CutoutError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, height, width]).into())
            .map_err(|e| CutoutError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| CutoutError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| CutoutError::model(format!("Failed to create runnable model: {e}")))?;

        log::info!(
            "Tract backend ready in {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            model,
            input_shape: (1, 3, height, width),
        })
    }
}

impl InferenceBackend for TractBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        log::debug!("Running Tract inference on {:?}", input.shape());

        let input_tensor = Tensor::from(input.clone());
        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| CutoutError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| CutoutError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output = output_tensor
            .to_array_view::<f32>()
            .map_err(|e| CutoutError::inference(format!("Failed to convert output tensor: {e}")))?
            .to_owned();
        Ok(output)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.input_shape
    }

    fn name(&self) -> &str {
        "tract"
    }
}
