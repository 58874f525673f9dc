//! Inference backend abstraction and the shared backend handle

use crate::error::{CutoutError, Result};
use instant::Instant;
use log::{debug, warn};
use ndarray::{Array4, ArrayD};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
};

/// Trait for inference backends
///
/// A backend is an opaque dense-segmentation model: a `(1, 3, H, W)` tensor
/// in, a probability map out. Only the output's last two axes are assumed to
/// be spatial; leading batch and channel axes are handled by the
/// postprocessor.
pub trait InferenceBackend: Send {
    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Model inference failures
    /// - Tensor conversion or processing errors
    /// - Invalid input tensor dimensions
    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>>;

    /// Expected input shape as (batch, channels, height, width)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Short backend name used in logs
    fn name(&self) -> &str;
}

/// Process-wide handle to a loaded backend
///
/// Cloning shares the same backend. Inference calls are serialized, at most
/// one in flight per backend, while callers stay free to run everything else
/// in parallel.
#[derive(Clone)]
pub struct SharedBackend {
    inner: Arc<Mutex<Box<dyn InferenceBackend>>>,
    name: Arc<str>,
    input_shape: (usize, usize, usize, usize),
}

impl SharedBackend {
    #[must_use]
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        let name: Arc<str> = Arc::from(backend.name());
        let input_shape = backend.input_shape();
        Self {
            inner: Arc::new(Mutex::new(backend)),
            name,
            input_shape,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.input_shape
    }

    /// Run one inference, waiting for any call already in flight
    ///
    /// A panic inside the backend is caught and reported as an inference error.
    /// This needs `panic = "unwind"`, which every profile of this crate keeps.
    ///
    /// # Errors
    /// - The backend failed or panicked
    pub fn run_inference(&self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        let mut backend = self.inner.lock().map_err(|_| {
            CutoutError::inference(format!("{} backend lock is poisoned", self.name))
        })?;
        let start = Instant::now();
        let output = panic::catch_unwind(AssertUnwindSafe(|| backend.infer(input))).map_err(
            |_| CutoutError::inference(format!("{} backend panicked during inference", self.name)),
        )??;
        debug!(
            "{} inference completed in {:.2}ms, output shape {:?}",
            self.name,
            start.elapsed().as_secs_f64() * 1000.0,
            output.shape()
        );
        Ok(output)
    }

    /// Run a single inference on an all-zeros tensor of the input shape
    ///
    /// Failures are logged and otherwise ignored; returns whether it succeeded.
    pub fn warmup(&self) -> bool {
        let (batch, channels, height, width) = self.input_shape;
        let zeros = Array4::<f32>::zeros((batch.max(1), channels, height, width));
        match self.run_inference(&zeros) {
            Ok(_) => {
                debug!("{} backend warmed up", self.name);
                true
            }
            Err(e) => {
                warn!("{} backend warm-up failed: {}", self.name, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for SharedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBackend")
            .field("name", &self.name)
            .field("input_shape", &self.input_shape)
            .finish_non_exhaustive()
    }
}
