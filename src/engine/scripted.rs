//! Scripted Recognition Engine
//!
//! Replays a JSON timeline of engine events. Used by the CLI harness to
//! exercise the capture controller without a live recognizer, including
//! the awkward cases: spontaneous ends, engines that ignore `stop()`,
//! denied permissions.

use super::{
    EngineConfig, EngineError, EngineEvent, EngineFactory, EngineListener, RecognitionEngine,
    RecognitionErrorKind, RecognitionResult,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Whole replay script: one entry per engine the controller creates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineScript {
    /// Fail every `create()` as if recognition were unavailable
    pub unsupported: bool,
    /// Fail every `create()` as if the microphone prompt were refused
    pub deny_permission: bool,
    pub sessions: Vec<SessionScript>,
}

/// Timeline for a single engine session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionScript {
    pub start_delay_ms: u64,
    /// Fire `Ended` after `stop()`. False mimics engines that never confirm.
    pub end_on_stop: bool,
    pub stop_delay_ms: u64,
    pub steps: Vec<ScriptStep>,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self {
            start_delay_ms: 20,
            end_on_stop: true,
            stop_delay_ms: 50,
            steps: Vec::new(),
        }
    }
}

/// An event fired `after_ms` after the previous step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    #[serde(default)]
    pub after_ms: u64,
    #[serde(flatten)]
    pub event: ScriptEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEvent {
    Result {
        results: Vec<RecognitionResult>,
        #[serde(default)]
        result_index: usize,
    },
    Error {
        kind: RecognitionErrorKind,
    },
    End,
}

impl From<ScriptEvent> for EngineEvent {
    fn from(event: ScriptEvent) -> Self {
        match event {
            ScriptEvent::Result {
                results,
                result_index,
            } => EngineEvent::Result {
                results,
                result_index,
            },
            ScriptEvent::Error { kind } => EngineEvent::Error(kind),
            ScriptEvent::End => EngineEvent::Ended,
        }
    }
}

/// Factory that hands out one scripted session per `create()`
pub struct ScriptedEngineFactory {
    script: EngineScript,
    next_session: AtomicUsize,
}

impl ScriptedEngineFactory {
    pub fn new(script: EngineScript) -> Self {
        Self {
            script,
            next_session: AtomicUsize::new(0),
        }
    }

    /// Load a replay script from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine script {}", path.display()))?;
        let script: EngineScript =
            serde_json::from_str(&content).context("Failed to parse engine script")?;
        info!(
            "📜 Loaded engine script with {} session(s)",
            script.sessions.len()
        );
        Ok(Self::new(script))
    }

    /// Number of engines created so far
    pub fn sessions_created(&self) -> usize {
        self.next_session.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineFactory for ScriptedEngineFactory {
    async fn create(
        &self,
        config: &EngineConfig,
        listener: EngineListener,
    ) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        if self.script.unsupported {
            return Err(EngineError::Unsupported(
                "Speech recognition not supported on this device".to_string(),
            ));
        }
        if self.script.deny_permission {
            return Err(EngineError::PermissionDenied(
                "Microphone access was refused".to_string(),
            ));
        }

        let index = self.next_session.fetch_add(1, Ordering::SeqCst);
        // Past the end of the script the engine just listens to silence
        let session = self.script.sessions.get(index).cloned().unwrap_or_default();
        debug!(
            "Scripted engine #{} created ({}, {} steps)",
            index,
            config.language,
            session.steps.len()
        );

        Ok(Box::new(ScriptedEngine {
            session,
            listener,
            replay: None,
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedEngine {
    session: SessionScript,
    listener: EngineListener,
    replay: Option<JoinHandle<()>>,
}

impl ScriptedEngine {
    fn halt_replay(&mut self) {
        if let Some(handle) = self.replay.take() {
            handle.abort();
        }
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.replay.is_some() {
            return Err(EngineError::Failed("engine already started".to_string()));
        }

        let listener = self.listener.clone();
        let session = self.session.clone();
        self.replay = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(session.start_delay_ms)).await;
            listener.emit(EngineEvent::Started);

            for step in session.steps {
                tokio::time::sleep(Duration::from_millis(step.after_ms)).await;
                let ends = matches!(step.event, ScriptEvent::End);
                if !listener.emit(step.event.into()) || ends {
                    return;
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.halt_replay();
        if self.session.end_on_stop {
            let listener = self.listener.clone();
            let delay = Duration::from_millis(self.session.stop_delay_ms);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                listener.emit(EngineEvent::Ended);
            });
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.halt_replay();
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.halt_replay();
    }
}
