use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::effects::Pipeline;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Native sample format of an asset, used to connect pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureFormat {
    /// AAC in an MPEG-4 container
    Aac,
    /// Uncompressed 16-bit PCM
    Pcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EncoderQuality {
    Min,
    Low,
    Medium,
    High,
    Max,
}

/// Settings handed to the capture device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub format: CaptureFormat,
    pub quality: EncoderQuality,
    /// Required for `Recorder::average_power`
    pub metering_enabled: bool,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            format: CaptureFormat::Aac,
            quality: EncoderQuality::Max,
            metering_enabled: true,
            sample_rate: 44100,
            channels: 1,
        }
    }
}

/// Shared audio route requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRoute {
    /// Capture with simultaneous output
    PlayAndRecord { default_to_speaker: bool },
    /// Output only
    Playback,
    /// Release the route
    Inactive,
}

/// Notification raised by a device outside any session call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Capture ended, either after `Recorder::stop` or on its own
    RecordingFinished { successfully: bool },
    /// The capture encoder failed
    EncodeError(String),
    /// The asset was played to the end
    PlaybackFinished { successfully: bool },
    /// The player failed to decode the asset
    DecodeError(String),
}

/// A device event tagged with the activity that produced it
#[derive(Debug, Clone)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: DeviceEvent,
}

/// Handle a device uses to raise events
///
/// Safe to use from any thread, including audio callback threads. Events
/// from a device whose activity has already ended are discarded by the
/// session.
#[derive(Debug, Clone)]
pub struct DeviceEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl DeviceEventSender {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the session has shut down
    pub fn send(&self, event: DeviceEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Platform audio backend
///
/// Implementations wrap the OS capture/render stack. Opening a device may
/// fail; everything after that is reported through `DeviceEventSender`.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Extension of the container the capture device writes
    fn container_extension(&self) -> &str;

    /// Negotiate the shared audio route
    async fn set_route(&self, route: AudioRoute) -> Result<()>;

    /// Create and prepare a capture device writing to `destination`
    async fn open_recorder(
        &self,
        destination: &Path,
        settings: &CaptureSettings,
        events: DeviceEventSender,
    ) -> Result<Box<dyn Recorder>>;

    /// Decode `source` and prepare it for playback
    async fn open_player(&self, source: &Path, events: DeviceEventSender)
        -> Result<Box<dyn Player>>;

    /// Open `source` as the head of an effects pipeline
    async fn open_effects_engine(
        &self,
        source: &Path,
        events: DeviceEventSender,
    ) -> Result<Box<dyn EffectsEngine>>;
}

/// A prepared capture device
pub trait Recorder: Send {
    fn record(&mut self) -> Result<()>;

    /// Elapsed capture time as reported by the device
    fn current_time(&self) -> Duration;

    /// Refresh the meters and return the average input power in dB
    fn average_power(&mut self) -> f32;

    fn stop(&mut self) -> Result<()>;
}

/// A decoded asset ready to play
pub trait Player: Send {
    fn duration(&self) -> Duration;

    fn seek(&mut self, position: Duration);

    fn play(&mut self) -> Result<()>;

    /// Halt without releasing the asset
    fn pause(&mut self);

    fn stop(&mut self);
}

/// Render engine hosting an effects pipeline
pub trait EffectsEngine: Send {
    /// Native format of the source asset
    fn format(&self) -> StreamFormat;

    fn total_length(&self) -> Duration;

    /// Position of the render head within the source asset
    fn render_position(&self) -> Duration;

    /// Attach and connect every stage, then start rendering
    fn start(&mut self, pipeline: &Pipeline) -> Result<()>;

    fn pause(&mut self);

    fn stop(&mut self);
}
