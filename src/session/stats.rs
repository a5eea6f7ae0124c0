use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::clock::ClockMode;
use super::playback::PlaybackState;
use super::recording::RecordingState;

/// The audio activity currently holding the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activity {
    Recording,
    Playback,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier used in log lines
    pub session_id: String,

    pub recording_state: RecordingState,

    pub playback_state: PlaybackState,

    /// Elapsed recording time in whole seconds
    pub recording_current_time: u64,

    /// Device-reported length of the last recording, set on stop
    pub recording_duration: u64,

    /// Elapsed playback time in whole seconds
    pub playing_current_time: u64,

    /// Decoded asset length, set when playback starts
    pub playing_duration: u64,

    /// Ticks counted by the progress clock since it was last armed
    pub elapsed_ticks: u64,

    /// Mode of the armed clock, if any
    pub clock_mode: Option<ClockMode>,

    /// Destination of the most recent recording
    pub last_recording: Option<PathBuf>,

    /// When this snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Which activity is live, if any
    pub fn active(&self) -> Option<Activity> {
        if self.recording_state == RecordingState::Recording {
            Some(Activity::Recording)
        } else if self.playback_state == PlaybackState::Playing {
            Some(Activity::Playback)
        } else {
            None
        }
    }
}
