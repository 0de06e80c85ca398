pub mod mock_engine;

use intake_capture::{CaptureError, CaptureObserver, CaptureSnapshot, Config, Transcription};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Observer that records every notification
#[derive(Default)]
pub struct RecordingObserver {
    pub starts: AtomicUsize,
    pub stops: Mutex<Vec<Duration>>,
    pub transcriptions: Mutex<Vec<Transcription>>,
    pub errors: Mutex<Vec<String>>,
    pub snapshots: Mutex<Vec<CaptureSnapshot>>,
}

impl RecordingObserver {
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn transcriptions(&self) -> Vec<Transcription> {
        self.transcriptions.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn snapshots(&self) -> Vec<CaptureSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl CaptureObserver for RecordingObserver {
    fn on_start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stop(&self, duration: Duration) {
        self.stops.lock().unwrap().push(duration);
    }

    fn on_transcription(&self, transcription: &Transcription) {
        self.transcriptions.lock().unwrap().push(transcription.clone());
    }

    fn on_error(&self, error: &CaptureError) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_status(&self, snapshot: &CaptureSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

/// Config with the default timings spelled out for the tests
pub fn test_config() -> Config {
    Config {
        finalize_timeout_ms: 2000,
        restart_delay_ms: 150,
        ..Default::default()
    }
}

/// Let the controller task drain its queue
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
