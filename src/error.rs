//! Error types for segmentation operations

use thiserror::Error;

/// Result type alias for segmentation operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Error kinds raised by the segmentation pipeline
///
/// Only some of these ever reach a caller of
/// [`SegmentationProcessor::remove_background`](crate::processor::SegmentationProcessor::remove_background):
/// backend and inference problems are absorbed by switching to the fallback
/// segmenter. See [`CutoutError::is_terminal`].
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from the `image` crate while encoding or resizing
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input bytes could not be interpreted as an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// No inference backend is loaded
    #[error("Inference backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend is loaded but the call failed or returned unusable output
    #[error("Inference error: {0}")]
    Inference(String),

    /// The classical segmentation path could not produce a mask
    #[error("Fallback segmentation failed: {0}")]
    Fallback(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Internal array or mask processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Configuration or summary (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CutoutError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new backend-unavailable error
    pub fn backend_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new fallback error
    pub fn fallback<S: Into<String>>(msg: S) -> Self {
        Self::Fallback(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Whether this error is reported to the caller instead of triggering a
    /// switch to the fallback path
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::BackendUnavailable(_) | Self::Inference(_) | Self::Processing(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CutoutError::invalid_config("test config error");
        assert!(matches!(err, CutoutError::InvalidConfig(_)));

        let err = CutoutError::decode("not an image");
        assert!(matches!(err, CutoutError::Decode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CutoutError::invalid_config("Invalid model path");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model path");

        let err = CutoutError::config_value_error("confidence_threshold", 1.5, "0.0-1.0");
        let message = err.to_string();
        assert!(message.contains("confidence_threshold"));
        assert!(message.contains("1.5"));
        assert!(message.contains("0.0-1.0"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!CutoutError::backend_unavailable("no model").is_terminal());
        assert!(!CutoutError::inference("bad output").is_terminal());
        assert!(!CutoutError::processing("empty tensor").is_terminal());

        assert!(CutoutError::decode("garbage").is_terminal());
        assert!(CutoutError::fallback("no pixels").is_terminal());
        assert!(CutoutError::invalid_config("kernel").is_terminal());
    }
}
