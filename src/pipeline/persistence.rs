// Loaded on startup and saved when the player quits.
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::loader::{SampleSource, source_for};
use crate::shared::{DEFAULT_MASTER_VOLUME, InstrumentStates};

const BATUQUE_DIR: &str = ".batuque";
const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "batuque.log";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub samples: String, // base URL or a directory
    pub extension: String,
    pub fetch_timeout_secs: u64,
    pub render_sample_rate: u32,
    pub tempo: Option<f32>, // overrides each tune's own speed
    pub master_volume: u8,
    pub instruments: InstrumentStates,
    pub last_tune: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            samples: "assets/audio".to_string(),
            extension: "mp3".to_string(),
            fetch_timeout_secs: 10,
            render_sample_rate: 44100,
            tempo: None,
            master_volume: DEFAULT_MASTER_VOLUME,
            instruments: InstrumentStates::default_mix(),
            last_tune: None,
        }
    }
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn sample_source(&self) -> Result<Box<dyn SampleSource>, FetchError> {
        source_for(&self.samples, &self.extension, self.fetch_timeout())
    }
}

// <project_dir>/.batuque/settings.json
fn settings_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(BATUQUE_DIR).join(SETTINGS_FILE)
}

pub fn log_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(BATUQUE_DIR).join(LOG_FILE)
}

/// Missing or unreadable settings mean defaults.
pub fn load_settings(project_dir: &Path) -> Option<Settings> {
    let path = settings_file_path(project_dir);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(settings) => Some(settings),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring corrupt settings: {e}");
            None
        }
    }
}

// Save settings to disk, making .batuque/ if it doesn't exist already
pub fn save_settings(project_dir: &Path, settings: &Settings) -> anyhow::Result<()> {
    let path = settings_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
