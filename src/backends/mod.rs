//! Backend implementations for different inference engines
//!
//! - Tract backend (pure Rust, no external dependencies; default)
//! - ONNX Runtime backend (GPU acceleration, `onnx` feature)
//! - Mock backends for tests and benchmarks

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::{CallCounter, MockBackend, MockBehavior};

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
