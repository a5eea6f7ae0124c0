//! Audio session management
//!
//! This module provides the `AudioSession` handle that coordinates:
//! - Recording start/stop with live input metering
//! - Playback play/pause/resume/stop, plain or through an effects pipeline
//! - A progress clock timing whichever activity is live
//! - Optional observer notifications and typed failure outcomes
//!
//! All state lives in one actor task; the handle only sends it commands.

mod actor;
mod clock;
mod config;
mod context;
mod error;
mod observer;
mod playback;
mod recording;
mod session;
mod stats;

pub use clock::{ClockMode, ProgressClock, Timeline};
pub use config::{ClockConfig, SessionConfig};
pub use error::{ErrorEvent, ErrorKind, SessionError};
pub use observer::{Observer, StopKind};
pub use playback::PlaybackState;
pub use recording::RecordingState;
pub use session::AudioSession;
pub use stats::{Activity, SessionSnapshot};
