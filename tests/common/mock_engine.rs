//! Mock Recognition Engine for Testing
//!
//! Lets a test fire engine events by hand and inspect what the controller
//! asked the engine to do.

use async_trait::async_trait;
use intake_capture::engine::{
    EngineConfig, EngineError, EngineEvent, EngineFactory, EngineListener, RecognitionEngine,
    RecognitionResult,
};
use std::sync::{Arc, Mutex};

struct MockState {
    listeners: Vec<EngineListener>,
    calls: Vec<String>,
    /// Fire `Started` from inside `start()`
    auto_start: bool,
    /// Fire `Ended` from inside `stop()`
    end_on_stop: bool,
    fail_create: Option<EngineError>,
}

/// Factory whose engines are driven by the test
#[derive(Clone)]
pub struct MockEngineFactory {
    state: Arc<Mutex<MockState>>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                listeners: Vec::new(),
                calls: Vec::new(),
                auto_start: true,
                end_on_stop: true,
                fail_create: None,
            })),
        }
    }

    /// Engines that never confirm their end after `stop()`
    pub fn silent_on_stop(self) -> Self {
        self.state.lock().unwrap().end_on_stop = false;
        self
    }

    /// Engines that wait for the test to emit `Started`
    pub fn manual_start(self) -> Self {
        self.state.lock().unwrap().auto_start = false;
        self
    }

    /// Make every following `create()` fail
    pub fn fail_create(&self, err: EngineError) {
        self.state.lock().unwrap().fail_create = Some(err);
    }

    /// Emit on the most recently created engine
    pub fn emit(&self, event: EngineEvent) -> bool {
        let listener = self.state.lock().unwrap().listeners.last().cloned();
        listener.map_or(false, |l| l.emit(event))
    }

    pub fn emit_results(&self, results: Vec<RecognitionResult>, result_index: usize) -> bool {
        self.emit(EngineEvent::Result {
            results,
            result_index,
        })
    }

    pub fn emit_final(&self, text: &str) -> bool {
        self.emit_results(vec![RecognitionResult::final_text(text)], 0)
    }

    pub fn emit_interim(&self, text: &str) -> bool {
        self.emit_results(vec![RecognitionResult::interim(text)], 0)
    }

    /// Listener handed to the `index`-th engine
    pub fn listener(&self, index: usize) -> EngineListener {
        self.state.lock().unwrap().listeners[index].clone()
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().listeners.len()
    }

    /// Engines whose listener is still attached to the controller
    pub fn attached(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .listeners
            .iter()
            .filter(|l| l.is_attached())
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn was_called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }
}

impl Default for MockEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create(
        &self,
        _config: &EngineConfig,
        listener: EngineListener,
    ) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_create.clone() {
            return Err(err);
        }
        let id = state.listeners.len();
        state.listeners.push(listener.clone());
        state.calls.push(format!("create#{}", id));
        Ok(Box::new(MockEngine {
            id,
            state: self.state.clone(),
            listener,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockEngine {
    id: usize,
    state: Arc<Mutex<MockState>>,
    listener: EngineListener,
}

impl MockEngine {
    /// Record a call and read a flag without holding the lock while emitting
    fn record(&self, call: &str, flag: fn(&MockState) -> bool) -> bool {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{}#{}", call, self.id));
        flag(&state)
    }
}

impl RecognitionEngine for MockEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        if self.record("start", |s| s.auto_start) {
            self.listener.emit(EngineEvent::Started);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        if self.record("stop", |s| s.end_on_stop) {
            self.listener.emit(EngineEvent::Ended);
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.record("abort", |_| false);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_engine_records_calls() {
        let factory = MockEngineFactory::new().manual_start();
        let (listener, _subscription) = EngineListener::new(|_| {});
        let mut engine = factory
            .create(&EngineConfig::default(), listener)
            .await
            .unwrap();
        engine.start().unwrap();
        engine.abort();

        assert_eq!(factory.calls(), vec!["create#0", "start#0", "abort#0"]);
        assert_eq!(factory.attached(), 1);
    }
}
