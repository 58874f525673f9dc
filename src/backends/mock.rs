//! Mock backends for tests and benchmarks
//!
//! These implement [`InferenceBackend`] without a model file so the pipeline
//! can be exercised end to end, including its failure paths.

use crate::{
    error::{CutoutError, Result},
    inference::InferenceBackend,
};
use ndarray::{Array4, ArrayD, Axis, IxDyn};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Shared count of `infer` calls, readable after the backend is moved away
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a [`MockBackend`] produces
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// 1.0 wherever a pixel differs from the top-left pixel by more than
    /// `tolerance` in any channel, 0.0 elsewhere
    ColorKey { tolerance: f32 },
    /// The same probability everywhere
    Constant(f32),
    /// A fixed output tensor, whatever the input
    Fixed(ArrayD<f32>),
    /// Every call returns an inference error
    Failing(String),
    /// Every call panics
    Panicking,
}

/// Configurable stand-in for a segmentation model
#[derive(Debug, Clone)]
pub struct MockBackend {
    behavior: MockBehavior,
    input_size: (usize, usize),
    calls: CallCounter,
}

impl MockBackend {
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            input_size: (1024, 1024),
            calls: CallCounter::default(),
        }
    }

    /// Treat the top-left colour as background
    #[must_use]
    pub fn color_key() -> Self {
        Self::new(MockBehavior::ColorKey { tolerance: 0.25 })
    }

    #[must_use]
    pub fn constant(probability: f32) -> Self {
        Self::new(MockBehavior::Constant(probability))
    }

    #[must_use]
    pub fn fixed(output: ArrayD<f32>) -> Self {
        Self::new(MockBehavior::Fixed(output))
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self::new(MockBehavior::Failing(message.to_string()))
    }

    #[must_use]
    pub fn panicking() -> Self {
        Self::new(MockBehavior::Panicking)
    }

    /// Set the reported input size as (width, height)
    #[must_use]
    pub fn with_input_size(mut self, width: usize, height: usize) -> Self {
        self.input_size = (width, height);
        self
    }

    /// Handle for observing how often `infer` ran
    #[must_use]
    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }

    #[allow(clippy::indexing_slicing)]
    fn color_key_output(input: &Array4<f32>, tolerance: f32) -> Result<ArrayD<f32>> {
        let (_, channels, height, width) = input.dim();
        if channels == 0 || height == 0 || width == 0 {
            return Err(CutoutError::inference("Empty input tensor"));
        }
        let sample = input.index_axis(Axis(0), 0);
        let key: Vec<f32> = (0..channels).map(|c| sample[[c, 0, 0]]).collect();

        let output = Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            let differs = key
                .iter()
                .enumerate()
                .any(|(c, &k)| (sample[[c, y, x]] - k).abs() > tolerance);
            if differs {
                1.0
            } else {
                0.0
            }
        });
        Ok(output.into_dyn())
    }
}

impl InferenceBackend for MockBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<ArrayD<f32>> {
        self.calls.increment();
        let (_, _, height, width) = input.dim();
        match &self.behavior {
            MockBehavior::ColorKey { tolerance } => Self::color_key_output(input, *tolerance),
            MockBehavior::Constant(value) => {
                Ok(ArrayD::from_elem(IxDyn(&[1, 1, height, width]), *value))
            }
            MockBehavior::Fixed(output) => Ok(output.clone()),
            MockBehavior::Failing(message) => Err(CutoutError::inference(message.clone())),
            MockBehavior::Panicking => panic!("mock backend panicked during inference"),
        }
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.input_size.1, self.input_size.0)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
