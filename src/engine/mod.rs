//! Recognition Engine Module
//!
//! The boundary to the external continuous speech-recognition capability.
//! The capture controller never reaches into ambient state for an engine;
//! it is handed an [`EngineFactory`] and attaches an [`EngineListener`] to
//! every engine it creates.
//!
//! Known engine quirks the controller tolerates:
//! - `Ended` can fire without `stop()` having been called
//! - `Error(NoSpeech)` can fire without ending the session
//! - some engines never fire `Ended` after `stop()`

pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

// Re-export main types
pub use scripted::{EngineScript, ScriptedEngineFactory};

/// Errors raised while creating or driving an engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Failed(String),
}

/// Engine session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: true,
            interim_results: true,
        }
    }
}

/// One entry of the engine's result list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub transcript: String,
    #[serde(default)]
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn final_text(text: &str) -> Self {
        Self {
            transcript: text.to_string(),
            is_final: true,
        }
    }

    pub fn interim(text: &str) -> Self {
        Self {
            transcript: text.to_string(),
            is_final: false,
        }
    }
}

/// Error codes reported through `EngineEvent::Error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecognitionErrorKind {
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    NotAllowed,
    ServiceNotAllowed,
    BadGrammar,
    LanguageNotSupported,
    Other(String),
}

impl RecognitionErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "not-allowed" => Self::NotAllowed,
            "service-not-allowed" => Self::ServiceNotAllowed,
            "bad-grammar" => Self::BadGrammar,
            "language-not-supported" => Self::LanguageNotSupported,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::NoSpeech => "no-speech",
            Self::Aborted => "aborted",
            Self::AudioCapture => "audio-capture",
            Self::Network => "network",
            Self::NotAllowed => "not-allowed",
            Self::ServiceNotAllowed => "service-not-allowed",
            Self::BadGrammar => "bad-grammar",
            Self::LanguageNotSupported => "language-not-supported",
            Self::Other(code) => code,
        }
    }

    /// Errors the engine may recover from on its own
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::Aborted)
    }

    /// Microphone or recognition service permission refused
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::NotAllowed | Self::ServiceNotAllowed)
    }
}

impl fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for RecognitionErrorKind {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<RecognitionErrorKind> for String {
    fn from(kind: RecognitionErrorKind) -> Self {
        kind.code().to_string()
    }
}

/// Events an engine delivers to its listener
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine has begun listening
    Started,
    /// The full result list for this engine session; entries from
    /// `result_index` onwards are new or changed
    Result {
        results: Vec<RecognitionResult>,
        result_index: usize,
    },
    Error(RecognitionErrorKind),
    /// The engine session terminated
    Ended,
}

type Deliver = Box<dyn Fn(EngineEvent) + Send + Sync>;

struct ListenerInner {
    attached: AtomicBool,
    deliver: Deliver,
}

/// Event sink handed to an engine on creation
#[derive(Clone)]
pub struct EngineListener {
    inner: Arc<ListenerInner>,
}

impl fmt::Debug for EngineListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineListener")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl EngineListener {
    /// Create a listener and the subscription that controls it
    pub fn new<F>(deliver: F) -> (Self, Subscription)
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        let inner = Arc::new(ListenerInner {
            attached: AtomicBool::new(true),
            deliver: Box::new(deliver),
        });
        (
            Self {
                inner: inner.clone(),
            },
            Subscription { inner },
        )
    }

    /// Deliver an event. Returns false once the subscription is detached.
    pub fn emit(&self, event: EngineEvent) -> bool {
        if !self.is_attached() {
            return false;
        }
        (self.inner.deliver)(event);
        true
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }
}

/// Owner side of an [`EngineListener`]. Dropping it detaches the listener.
pub struct Subscription {
    inner: Arc<ListenerInner>,
}

impl Subscription {
    pub fn detach(&self) {
        self.inner.attached.store(false, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A single continuous recognition session
pub trait RecognitionEngine: Send {
    /// Begin listening; `Started` follows asynchronously
    fn start(&mut self) -> Result<(), EngineError>;

    /// Request graceful termination; `Ended` should follow asynchronously
    fn stop(&mut self) -> Result<(), EngineError>;

    /// Immediate termination, `Ended` may never fire
    fn abort(&mut self);

    fn name(&self) -> &str {
        "engine"
    }
}

/// Creates engines for the capture controller
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Create an engine wired to `listener`. May suspend on a permission prompt.
    async fn create(
        &self,
        config: &EngineConfig,
        listener: EngineListener,
    ) -> Result<Box<dyn RecognitionEngine>, EngineError>;

    fn name(&self) -> &str;
}
