use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::CaptureSettings;

/// Configuration for an audio session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Unique session identifier used in log lines
    pub session_id: String,

    /// Directory holding the default recording destination
    pub documents_dir: PathBuf,

    /// File stem of the default recording destination
    pub recording_file_stem: String,

    /// Progress clock intervals
    pub clock: ClockConfig,

    /// Settings handed to the capture device
    pub capture: CaptureSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            documents_dir: dirs::document_dir().unwrap_or_else(|| PathBuf::from(".")),
            recording_file_stem: "recordedVoice".to_string(),
            clock: ClockConfig::default(),
            capture: CaptureSettings::default(),
        }
    }
}

impl SessionConfig {
    /// `<documents_dir>/<stem>.<extension>`
    pub fn default_recording_path(&self, extension: &str) -> PathBuf {
        default_recording_path(&self.documents_dir, &self.recording_file_stem, extension)
    }
}

fn default_recording_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", stem, extension))
}

/// Tick intervals of the progress clock
///
/// Recording ticks twice a second so the input meter refreshes between whole
/// seconds; playback ticks once a second. Elapsed seconds are always
/// `ticks * tick_ms / 1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub recording_tick_ms: u64,
    pub playback_tick_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            recording_tick_ms: 500,
            playback_tick_ms: 1000,
        }
    }
}

impl ClockConfig {
    pub fn recording_tick(&self) -> Duration {
        Duration::from_millis(self.recording_tick_ms.max(1))
    }

    pub fn playback_tick(&self) -> Duration {
        Duration::from_millis(self.playback_tick_ms.max(1))
    }
}
