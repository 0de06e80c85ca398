//! Capture Status Projector
//!
//! Pure projection of controller state into what the UI renders.

use serde::{Deserialize, Serialize};

/// Displayed capture status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    #[default]
    Idle,
    Starting,
    Listening,
    Processing,
    Error,
}

impl CaptureStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CaptureStatus::Idle => "Ready",
            CaptureStatus::Starting => "Starting microphone...",
            CaptureStatus::Listening => "Listening...",
            CaptureStatus::Processing => "Processing...",
            CaptureStatus::Error => "Speech capture failed",
        }
    }
}

/// The user's desired capture state, independent of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Idle,
    Capturing,
    /// A finalize is waiting on the engine
    Stopping,
}

/// Where the current engine handle is in its own lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnginePhase {
    /// No engine handle
    #[default]
    Absent,
    /// Created and asked to start, `Started` not yet seen
    Starting,
    Running,
    Ended,
}

/// Controller state the projection reads
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionInput<'a> {
    pub intent: Intent,
    pub engine: EnginePhase,
    /// The engine has confirmed listening at least once for this capture
    pub listening_confirmed: bool,
    pub error: Option<&'a str>,
    pub finalized_text: &'a str,
    pub interim_text: &'a str,
    pub live_transcript: &'a str,
}

/// Everything a UI consumer observes about capture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSnapshot {
    pub status: CaptureStatus,
    pub label: String,
    /// The engine is running right now; blips during auto-restart
    pub is_recording: bool,
    /// The user wants capture; stays true across auto-restarts
    pub is_capturing: bool,
    pub live_transcript: String,
    pub interim_transcript: String,
    pub finalized_transcript: String,
    pub error: Option<String>,
}

/// Derive the displayed status
pub fn project_status(input: &ProjectionInput<'_>) -> CaptureStatus {
    if input.error.is_some() {
        return CaptureStatus::Error;
    }
    match input.intent {
        Intent::Stopping => CaptureStatus::Processing,
        // After the first confirmation, restarts stay invisible
        Intent::Capturing if input.listening_confirmed => CaptureStatus::Listening,
        Intent::Capturing => match input.engine {
            EnginePhase::Running => CaptureStatus::Listening,
            _ => CaptureStatus::Starting,
        },
        Intent::Idle => CaptureStatus::Idle,
    }
}

/// Build the full UI snapshot
pub fn project(input: &ProjectionInput<'_>) -> CaptureSnapshot {
    let status = project_status(input);
    let label = match (status, input.error) {
        (CaptureStatus::Error, Some(error)) => format!("{}: {}", status.label(), error),
        _ => status.label().to_string(),
    };

    CaptureSnapshot {
        status,
        label,
        is_recording: input.engine == EnginePhase::Running,
        is_capturing: input.intent == Intent::Capturing,
        live_transcript: input.live_transcript.to_string(),
        interim_transcript: input.interim_text.to_string(),
        finalized_transcript: input.finalized_text.to_string(),
        error: input.error.map(str::to_string),
    }
}
