//! Intake Capture Error Types
//!
//! Centralized error handling for the capture controller and its engines.

use crate::engine::{EngineError, RecognitionErrorKind};
use thiserror::Error;

/// Central error type for speech capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Speech recognition not supported: {0}")]
    Unsupported(String),

    #[error("Microphone or recognition permission denied: {0}")]
    PermissionDenied(String),

    #[error("Recognition engine error: {0}")]
    Engine(String),

    #[error("Speech recognition error: {0}")]
    Recognition(RecognitionErrorKind),

    #[error("A capture is already in progress")]
    AlreadyCapturing,

    #[error("A finalize is still in progress")]
    Finalizing,

    #[error("Capture start was cancelled")]
    Cancelled,

    #[error("Capture controller has shut down")]
    ControllerClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaptureError {
    /// Permission and capability failures. These are never retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            CaptureError::Unsupported(_) | CaptureError::PermissionDenied(_) => true,
            CaptureError::Recognition(kind) => !kind.is_transient(),
            _ => false,
        }
    }
}

impl From<EngineError> for CaptureError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unsupported(msg) => CaptureError::Unsupported(msg),
            EngineError::PermissionDenied(msg) => CaptureError::PermissionDenied(msg),
            EngineError::Failed(msg) => CaptureError::Engine(msg),
        }
    }
}

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;
