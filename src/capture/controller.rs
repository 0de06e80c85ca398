//! Capture Lifecycle Controller
//!
//! A handle/task pair. [`CaptureController`] is a cheap cloneable handle;
//! a single tokio task owns the session, the transcript and the engine.
//! User commands, engine events and timers all arrive on one channel, so
//! every transition is serialised the way a host event loop would.
//!
//! The finalize timeout only fires for an engine that never reports its end.

use super::session::{CaptureSession, EngineHandle, PendingFinalize};
use super::{CaptureObserver, Transcription};
use crate::config::Config;
use crate::engine::{EngineEvent, EngineFactory, EngineListener, RecognitionErrorKind};
use crate::error::{CaptureError, CaptureResult};
use crate::status::{self, CaptureSnapshot, CaptureStatus, EnginePhase, Intent, ProjectionInput};
use crate::transcript::TranscriptAccumulator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Everything the controller task reacts to
enum Message {
    Start {
        reset_transcript: bool,
        reply: oneshot::Sender<CaptureResult<()>>,
    },
    Stop {
        reply: oneshot::Sender<Transcription>,
    },
    Reset,
    Engine {
        generation: u64,
        event: EngineEvent,
    },
    FinalizeTimeout {
        ticket: u64,
    },
    RestartDue {
        token: u64,
    },
    Shutdown,
}

struct Shared {
    tx: mpsc::UnboundedSender<Message>,
    status: watch::Receiver<CaptureSnapshot>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Shutdown);
    }
}

/// Handle to the speech capture controller
#[derive(Clone)]
pub struct CaptureController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureController")
            .field("status", &self.status())
            .finish()
    }
}

impl CaptureController {
    /// Spawn the controller task. Must be called inside a tokio runtime.
    pub fn new(factory: Arc<dyn EngineFactory>, config: Config) -> Self {
        Self::spawn(factory, config, None)
    }

    pub fn with_observer(
        factory: Arc<dyn EngineFactory>,
        config: Config,
        observer: Arc<dyn CaptureObserver>,
    ) -> Self {
        Self::spawn(factory, config, Some(observer))
    }

    fn spawn(
        factory: Arc<dyn EngineFactory>,
        config: Config,
        observer: Option<Arc<dyn CaptureObserver>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(CaptureSnapshot {
            label: CaptureStatus::Idle.label().to_string(),
            ..Default::default()
        });

        info!(
            "🛠️ Capture controller using '{}' engine ({})",
            factory.name(),
            config.language
        );

        let task = ControllerTask {
            factory,
            config,
            observer,
            tx: tx.clone(),
            session: CaptureSession::default(),
            transcript: TranscriptAccumulator::new(),
            error: None,
            next_generation: 0,
            next_ticket: 0,
            status_tx,
        };
        tokio::spawn(task.run(rx));

        Self {
            shared: Arc::new(Shared {
                tx,
                status: status_rx,
            }),
        }
    }

    /// Start a fresh capture, clearing the transcript
    pub async fn start_recording(&self) -> CaptureResult<()> {
        self.start_capture(true).await
    }

    /// Start capturing. Resolves once the engine confirms it is listening.
    ///
    /// With `reset_transcript == false` new speech is appended to the
    /// existing transcript.
    pub async fn start_capture(&self, reset_transcript: bool) -> CaptureResult<()> {
        let (reply, rx) = oneshot::channel();
        self.shared
            .tx
            .send(Message::Start {
                reset_transcript,
                reply,
            })
            .map_err(|_| CaptureError::ControllerClosed)?;
        rx.await.map_err(|_| CaptureError::ControllerClosed)?
    }

    /// Stop capturing and return the final transcript.
    ///
    /// Never fails: an empty transcript means nothing was recognised.
    pub async fn stop_and_transcribe(&self) -> Transcription {
        let (reply, rx) = oneshot::channel();
        if self.shared.tx.send(Message::Stop { reply }).is_err() {
            return Transcription::default();
        }
        rx.await.unwrap_or_default()
    }

    /// Abort any capture and clear all state
    pub fn reset(&self) {
        let _ = self.shared.tx.send(Message::Reset);
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        self.shared.status.borrow().clone()
    }

    /// Receiver notified on every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.shared.status.clone()
    }

    pub fn status(&self) -> CaptureStatus {
        self.shared.status.borrow().status
    }

    pub fn is_recording(&self) -> bool {
        self.shared.status.borrow().is_recording
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.status.borrow().is_capturing
    }

    pub fn live_transcript(&self) -> String {
        self.shared.status.borrow().live_transcript.clone()
    }

    pub fn interim_transcript(&self) -> String {
        self.shared.status.borrow().interim_transcript.clone()
    }
}

struct ControllerTask {
    factory: Arc<dyn EngineFactory>,
    config: Config,
    observer: Option<Arc<dyn CaptureObserver>>,
    tx: mpsc::UnboundedSender<Message>,
    session: CaptureSession,
    transcript: TranscriptAccumulator,
    error: Option<String>,
    next_generation: u64,
    next_ticket: u64,
    status_tx: watch::Sender<CaptureSnapshot>,
}

impl ControllerTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Start {
                    reset_transcript,
                    reply,
                } => self.handle_start(reset_transcript, reply).await,
                Message::Stop { reply } => self.handle_stop(reply),
                Message::Reset => self.handle_reset(),
                Message::Engine { generation, event } => {
                    self.handle_engine_event(generation, event)
                }
                Message::FinalizeTimeout { ticket } => self.handle_finalize_timeout(ticket),
                Message::RestartDue { token } => self.handle_restart_due(token).await,
                Message::Shutdown => break,
            }
            self.publish();
        }

        debug!("Capture controller shutting down");
        self.handle_reset();
    }

    async fn handle_start(
        &mut self,
        reset_transcript: bool,
        reply: oneshot::Sender<CaptureResult<()>>,
    ) {
        match self.session.intent {
            Intent::Capturing => {
                let _ = reply.send(Err(CaptureError::AlreadyCapturing));
                return;
            }
            Intent::Stopping => {
                let _ = reply.send(Err(CaptureError::Finalizing));
                return;
            }
            Intent::Idle => {}
        }

        info!("🎙️ Starting capture (reset transcript: {})", reset_transcript);
        self.error = None;
        if reset_transcript {
            self.transcript.reset();
        }
        self.session.begin(reply);
        self.publish();

        if let Err(e) = self.spawn_engine().await {
            self.fail(e);
        }
    }

    /// Create and start an engine unless one is already live
    async fn spawn_engine(&mut self) -> CaptureResult<()> {
        if let Some(generation) = self.session.engine_generation() {
            warn!(
                "⚠️ Engine #{} still attached, not creating another",
                generation
            );
            return Ok(());
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let tx = self.tx.clone();
        let (listener, subscription) = EngineListener::new(move |event| {
            let _ = tx.send(Message::Engine { generation, event });
        });

        let factory = self.factory.clone();
        let mut engine = factory
            .create(&self.config.engine_config(), listener)
            .await?;
        if let Err(e) = engine.start() {
            subscription.detach();
            engine.abort();
            return Err(e.into());
        }

        debug!("Engine #{} ({}) starting", generation, engine.name());
        self.transcript.start_engine_session();
        self.session.has_engine_ended = false;
        self.session.engine = Some(EngineHandle {
            generation,
            engine,
            subscription,
            phase: EnginePhase::Starting,
        });
        Ok(())
    }

    fn handle_engine_event(&mut self, generation: u64, event: EngineEvent) {
        if self.session.engine_generation() != Some(generation) {
            debug!("Ignoring {:?} from detached engine #{}", event, generation);
            return;
        }

        match event {
            EngineEvent::Started => self.handle_engine_started(),
            EngineEvent::Result {
                results,
                result_index,
            } => {
                self.transcript.apply_results(&results, result_index);
            }
            EngineEvent::Error(kind) => self.handle_engine_error(kind),
            EngineEvent::Ended => self.handle_engine_end(),
        }
    }

    fn handle_engine_started(&mut self) {
        if let Some(handle) = self.session.engine.as_mut() {
            handle.phase = EnginePhase::Running;
        }
        if let Some(reply) = self.session.pending_start.take() {
            let _ = reply.send(Ok(()));
        }

        if self.session.intent == Intent::Capturing && !self.session.listening_confirmed {
            self.session.listening_confirmed = true;
            info!("👂 Listening");
            self.notify(|o| o.on_start());
        } else {
            debug!("Engine resumed listening");
        }
    }

    fn handle_engine_error(&mut self, kind: RecognitionErrorKind) {
        if kind.is_transient() {
            debug!("Ignoring transient recognition error: {}", kind);
            return;
        }
        if kind.is_permission() {
            self.fail(CaptureError::PermissionDenied(format!(
                "recognition engine reported {}",
                kind
            )));
            return;
        }
        self.fail(CaptureError::Recognition(kind));
    }

    fn handle_engine_end(&mut self) {
        if let Some(handle) = self.session.engine.as_mut() {
            handle.phase = EnginePhase::Ended;
        }
        self.session.has_engine_ended = true;

        if self.session.pending_finalize.is_some() {
            debug!("Engine confirmed end, finalizing");
            self.finish_finalize();
            return;
        }

        self.session.teardown_engine();
        if self.session.intent == Intent::Capturing {
            let delay = self.config.restart_delay();
            info!("🔁 Engine ended on its own, restarting in {:?}", delay);
            let token = self.next_ticket();
            self.session.restart_token = Some(token);
            let tx = self.tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Message::RestartDue { token });
            });
        }
    }

    async fn handle_restart_due(&mut self, token: u64) {
        if self.session.restart_token != Some(token) {
            debug!("Ignoring stale restart timer");
            return;
        }
        self.session.restart_token = None;
        if self.session.intent != Intent::Capturing {
            return;
        }

        debug!("Restarting recognition engine");
        if let Err(e) = self.spawn_engine().await {
            self.fail(e);
        }
    }

    fn handle_stop(&mut self, reply: oneshot::Sender<Transcription>) {
        if let Some(pending) = self.session.pending_finalize.as_mut() {
            debug!("Finalize already pending, sharing its result");
            pending.waiters.push(reply);
            return;
        }

        self.session.cancel_start(CaptureError::Cancelled);
        self.session.restart_token = None;

        let ticket = self.next_ticket();
        self.session.pending_finalize = Some(PendingFinalize {
            ticket,
            waiters: vec![reply],
        });

        if !self.session.engine_is_live() {
            self.finish_finalize();
            return;
        }

        info!("⏹️ Stopping capture");
        self.session.intent = Intent::Stopping;
        let stopped = match self.session.engine.as_mut() {
            Some(handle) => handle.engine.stop(),
            None => Ok(()),
        };
        if let Err(e) = stopped {
            warn!("⚠️ Engine refused to stop ({}), finalizing now", e);
            self.finish_finalize();
            return;
        }

        let timeout = self.config.finalize_timeout();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(Message::FinalizeTimeout { ticket });
        });
    }

    fn handle_finalize_timeout(&mut self, ticket: u64) {
        match &self.session.pending_finalize {
            Some(pending) if pending.ticket == ticket => {}
            _ => return,
        }
        warn!(
            "⏱️ Engine did not confirm end within {:?}, finalizing with current transcript",
            self.config.finalize_timeout()
        );
        self.finish_finalize();
    }

    /// Resolve the pending finalize. Clearing it first makes this exactly-once.
    fn finish_finalize(&mut self) {
        let Some(pending) = self.session.pending_finalize.take() else {
            return;
        };

        let duration_ms = self.session.elapsed_ms();
        let transcription = Transcription {
            text: self.transcript.full_transcript(),
            duration_ms,
            started_at: self.session.started_at.map(|(_, wall)| wall),
        };

        self.session.teardown_engine();
        self.session.clear();

        info!(
            "📝 Capture finalized: {} chars{}",
            transcription.text.len(),
            if transcription.is_empty() {
                " (no speech recognised)"
            } else {
                ""
            }
        );
        if let Some(ms) = duration_ms {
            self.notify(|o| o.on_stop(Duration::from_millis(ms)));
        }
        self.notify(|o| o.on_transcription(&transcription));

        for waiter in pending.waiters {
            let _ = waiter.send(transcription.clone());
        }
    }

    /// Fatal failure: no restart, intent back to idle, error surfaced
    fn fail(&mut self, err: CaptureError) {
        error!("❌ Speech capture failed: {}", err);
        self.session.teardown_engine();
        self.session.intent = Intent::Idle;
        self.session.restart_token = None;
        self.error = Some(err.to_string());
        self.notify(|o| o.on_error(&err));

        if let Some(reply) = self.session.pending_start.take() {
            let _ = reply.send(Err(err));
        }
        // Finalize never rejects
        self.finish_finalize();
    }

    fn handle_reset(&mut self) {
        debug!("Resetting capture state");
        if let Some(pending) = self.session.pending_finalize.take() {
            for waiter in pending.waiters {
                let _ = waiter.send(Transcription::default());
            }
        }
        self.session.teardown_engine();
        self.session.clear();
        self.transcript.reset();
        self.error = None;
    }

    fn next_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    fn notify<F: FnOnce(&dyn CaptureObserver)>(&self, f: F) {
        if let Some(observer) = &self.observer {
            f(observer.as_ref());
        }
    }

    fn publish(&mut self) {
        let live = self.transcript.full_transcript();
        let finalized = self.transcript.finalized_text();
        let snapshot = status::project(&ProjectionInput {
            intent: self.session.intent,
            engine: self.session.engine_phase(),
            listening_confirmed: self.session.listening_confirmed,
            error: self.error.as_deref(),
            finalized_text: &finalized,
            interim_text: self.transcript.interim_text(),
            live_transcript: &live,
        });

        let changed = self.status_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
        if changed {
            self.notify(|o| o.on_status(&snapshot));
        }
    }
}
