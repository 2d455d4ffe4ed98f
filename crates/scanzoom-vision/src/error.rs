//! Error types for vision operations.
//!
//! Detector and zoom failures are produced by collaborator implementations
//! and swallowed by the capture loop; only construction and configuration
//! errors ever reach the caller.

use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur in the targeting pipeline.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Native detector failed: {0}")]
    DetectorFailed(String),

    #[error("Zoom apply rejected: {0}")]
    ZoomRejected(String),

    #[error("Zoom is not supported by this camera")]
    ZoomUnsupported,

    #[error("Torch is not supported by this camera")]
    TorchUnsupported,

    #[error("Camera switch failed: {0}")]
    CameraSwitchFailed(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Scanner session is closed")]
    SessionClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    /// Create a detector failure error.
    pub fn detector_failed(message: impl Into<String>) -> Self {
        Self::DetectorFailed(message.into())
    }

    /// Create a zoom rejection error.
    pub fn zoom_rejected(message: impl Into<String>) -> Self {
        Self::ZoomRejected(message.into())
    }

    /// Create an invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
