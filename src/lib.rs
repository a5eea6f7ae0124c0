pub mod audio;
pub mod config;
pub mod effects;
pub mod session;

pub use audio::{
    AudioBackend, AudioFile, AudioFrame, AudioRoute, CaptureSettings, DeviceEvent,
    DeviceEventSender, HeadlessBackend,
};
pub use config::Config;
pub use effects::{EffectsConfig, EffectsGraph, Pipeline, Stage, StageKind};
pub use session::{
    AudioSession, ErrorEvent, ErrorKind, Observer, PlaybackState, RecordingState,
    SessionConfig, SessionError, SessionSnapshot, StopKind,
};
