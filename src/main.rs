//! Intake Capture - speech capture replay harness
//!
//! Drives the capture controller with a scripted recognition engine and
//! prints the finalized transcript.

use anyhow::{Context, Result};
use clap::Parser;
use intake_capture::engine::ScriptedEngineFactory;
use intake_capture::{CaptureController, Config};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine replay script (JSON)
    #[arg(short, long)]
    script: PathBuf,

    /// How long to capture before stopping
    #[arg(short, long, default_value_t = 3000)]
    listen_ms: u64,

    /// Config file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Setup logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🎤 Intake capture v{} starting...", env!("CARGO_PKG_VERSION"));

    let factory = Arc::new(ScriptedEngineFactory::from_path(&args.script)?);
    let controller = CaptureController::new(factory, config);

    let mut status_rx = controller.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let snapshot = status_rx.borrow_and_update().clone();
            info!(
                "📊 {} | capturing={} recording={} | \"{}\"",
                snapshot.label,
                snapshot.is_capturing,
                snapshot.is_recording,
                snapshot.live_transcript
            );
        }
    });

    controller
        .start_recording()
        .await
        .context("Could not start speech capture")?;

    tokio::time::sleep(Duration::from_millis(args.listen_ms)).await;

    let transcription = controller.stop_and_transcribe().await;
    if transcription.is_empty() {
        warn!("🤷 No speech recognised, the task should ask for a retry");
    }

    println!("{}", serde_json::to_string_pretty(&transcription)?);
    Ok(())
}
