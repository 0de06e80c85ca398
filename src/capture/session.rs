//! Capture session state owned by the controller task.

use super::Transcription;
use crate::engine::{RecognitionEngine, Subscription};
use crate::error::{CaptureError, CaptureResult};
use crate::status::{EnginePhase, Intent};
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

/// The one live engine and the listener attached to it
pub(crate) struct EngineHandle {
    pub generation: u64,
    pub engine: Box<dyn RecognitionEngine>,
    pub subscription: Subscription,
    pub phase: EnginePhase,
}

/// Callers waiting on a single finalize
pub(crate) struct PendingFinalize {
    pub ticket: u64,
    pub waiters: Vec<oneshot::Sender<Transcription>>,
}

#[derive(Default)]
pub(crate) struct CaptureSession {
    pub intent: Intent,
    pub engine: Option<EngineHandle>,
    pub started_at: Option<(Instant, DateTime<Utc>)>,
    pub has_engine_ended: bool,
    pub listening_confirmed: bool,
    pub pending_finalize: Option<PendingFinalize>,
    pub pending_start: Option<oneshot::Sender<CaptureResult<()>>>,
    /// Token of the scheduled auto-restart, if any
    pub restart_token: Option<u64>,
}

impl CaptureSession {
    /// Enter `Capturing` for a fresh capture
    pub fn begin(&mut self, reply: oneshot::Sender<CaptureResult<()>>) {
        self.intent = Intent::Capturing;
        self.started_at = Some((Instant::now(), Utc::now()));
        self.has_engine_ended = false;
        self.listening_confirmed = false;
        self.restart_token = None;
        self.pending_start = Some(reply);
    }

    pub fn engine_phase(&self) -> EnginePhase {
        self.engine
            .as_ref()
            .map_or(EnginePhase::Absent, |handle| handle.phase)
    }

    pub fn engine_generation(&self) -> Option<u64> {
        self.engine.as_ref().map(|handle| handle.generation)
    }

    /// An engine exists and has not reported its end
    pub fn engine_is_live(&self) -> bool {
        !self.has_engine_ended
            && matches!(
                self.engine_phase(),
                EnginePhase::Starting | EnginePhase::Running
            )
    }

    /// Detach the listener and drop the engine, aborting it if still live
    pub fn teardown_engine(&mut self) {
        if let Some(mut handle) = self.engine.take() {
            handle.subscription.detach();
            if handle.phase != EnginePhase::Ended {
                handle.engine.abort();
            }
            debug!(
                "Engine #{} ({}) torn down",
                handle.generation,
                handle.engine.name()
            );
        }
    }

    /// Resolve an in-flight start with `err`
    pub fn cancel_start(&mut self, err: CaptureError) {
        if let Some(reply) = self.pending_start.take() {
            let _ = reply.send(Err(err));
        }
    }

    /// Milliseconds since capture began
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.started_at
            .map(|(instant, _)| instant.elapsed().as_millis() as u64)
    }

    /// Return to the initial state. Tear the engine down first.
    pub fn clear(&mut self) {
        self.cancel_start(CaptureError::Cancelled);
        *self = Self::default();
    }
}
