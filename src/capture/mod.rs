//! Speech Capture Module
//!
//! The capture lifecycle controller: turns "start capturing" / "stop and
//! finalize" into engine start/stop calls, restarts engines that end on
//! their own while capture is still wanted, and resolves every finalize
//! exactly once.

mod controller;
mod session;

use crate::error::CaptureError;
use crate::status::CaptureSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use controller::CaptureController;

/// Result of a finalize
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    /// Empty when nothing was recognised; callers decide whether to retry
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Transcription {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Hooks for capture lifecycle notifications.
///
/// Called from the controller task; implementations must not block.
pub trait CaptureObserver: Send + Sync {
    /// The engine confirmed listening for a new capture
    fn on_start(&self) {}

    /// A capture was finalized after running for `duration`
    fn on_stop(&self, _duration: Duration) {}

    fn on_transcription(&self, _transcription: &Transcription) {}

    /// A fatal failure ended the capture
    fn on_error(&self, _error: &CaptureError) {}

    /// The projected snapshot changed
    fn on_status(&self, _snapshot: &CaptureSnapshot) {}
}
