//! Device boundary
//!
//! The session only talks to audio hardware through the traits in `backend`.
//! `headless` implements them on top of plain files and the tokio clock.

pub mod backend;
pub mod file;
pub mod headless;

pub use backend::{
    AudioBackend, AudioFrame, AudioRoute, CaptureFormat, CaptureSettings, DeviceEvent,
    DeviceEventSender, EffectsEngine, EncoderQuality, Player, Recorder, StreamFormat,
    TaggedEvent,
};
pub use file::{AssetInfo, AudioFile};
pub use headless::{frame_level_db, HeadlessBackend, SILENCE_DB};
