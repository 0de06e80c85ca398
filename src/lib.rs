//! Intake Capture Library
//!
//! Speech capture for the reading-skills intake assessment: a restartable
//! continuous-recognition controller with live transcription and a
//! race-free stop/finalize.

pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod status;
pub mod transcript;

// Re-export main types
pub use capture::{CaptureController, CaptureObserver, Transcription};
pub use config::Config;
pub use error::{CaptureError, CaptureResult};
pub use status::{CaptureSnapshot, CaptureStatus};
