use crate::engine::EngineConfig;
use crate::error::{CaptureError, CaptureResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Capture configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Recognition
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,

    // Timing
    /// Upper bound on waiting for the engine to confirm it ended
    pub finalize_timeout_ms: u64,
    /// Pause before re-creating an engine that ended on its own
    pub restart_delay_ms: u64,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: true,
            interim_results: true,
            finalize_timeout_ms: 2000,
            restart_delay_ms: 150,
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from the user config dir, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from `path`, falling back to defaults when it is missing or bad
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let parsed = serde_json::from_str::<Config>(&content)
            .map_err(CaptureError::from)
            .and_then(|config| config.validate().map(|_| config));

        match parsed {
            Ok(config) => Ok(config),
            Err(e) => {
                // Graceful degradation: log warning and use defaults
                tracing::warn!("⚠️ Config file invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to the user config dir
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.finalize_timeout_ms == 0 {
            return Err(CaptureError::Config(
                "finalize_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.language.trim().is_empty() {
            return Err(CaptureError::Config("language must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            language: self.language.clone(),
            continuous: self.continuous,
            interim_results: self.interim_results,
        }
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_millis(self.finalize_timeout_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("intake-capture")
        .join("config.json")
}
