use serde::{Deserialize, Serialize};
use std::fmt;

use super::stats::Activity;

/// Failure taxonomy reported to observers
///
/// The integer codes are stable and match what embedding applications
/// already switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorKind {
    /// The capture device could not be created or prepared
    RecorderInitFailed = -1,
    /// A meter sample was requested while no capture device exists
    RecorderIsNil = -2,
    /// `stop_recording` was called with no active capture device
    RecorderStopFailed = -3,
    /// The playback source is missing or could not be opened
    PlayFailed = -4,
    /// The player failed to decode, or the capture encoder failed to encode
    PlayDecodeError = -5,
    /// `pause`/`stop_playback` was called with nothing to pause or stop
    PlayStopFailed = -6,
    /// The effects engine refused to start ("playSound failed")
    EffectsStartFailed = -7,
}

impl ErrorKind {
    /// Capture encoder failures share the decode code
    pub const ENCODE_ERROR: ErrorKind = ErrorKind::PlayDecodeError;

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::RecorderInitFailed => "recorder init failed",
            ErrorKind::RecorderIsNil => "recorder is nil",
            ErrorKind::RecorderStopFailed => "recorder stop failed",
            ErrorKind::PlayFailed => "play failed",
            ErrorKind::PlayDecodeError => "play decode error",
            ErrorKind::PlayStopFailed => "play stop failed",
            ErrorKind::EffectsStartFailed => "effects start failed",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// A single failure occurrence, dispatched at most once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    /// Human-readable detail (flattened error chain)
    pub context: String,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
        }
    }

    /// Build an event from an `anyhow` error, keeping the whole context chain
    pub fn from_error(kind: ErrorKind, err: &anyhow::Error) -> Self {
        Self::new(kind, format!("{:#}", err))
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.context)
    }
}

/// Outcome of a rejected or failed session operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// A taxonomy failure, also dispatched to the observer
    #[error("{0}")]
    Failed(ErrorEvent),

    /// The other activity holds the session
    #[error("session is busy: {active:?} in progress")]
    Busy { active: Activity },

    /// The session actor has shut down
    #[error("session has shut down")]
    Closed,
}

impl SessionError {
    /// Taxonomy kind, if this is a reported failure
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SessionError::Failed(event) => Some(event.kind),
            _ => None,
        }
    }
}

impl From<ErrorEvent> for SessionError {
    fn from(event: ErrorEvent) -> Self {
        SessionError::Failed(event)
    }
}
