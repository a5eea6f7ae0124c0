// Headless audio backend: real files, no sound card
//
// Capture consumes PCM frames from a channel and writes them to a WAV file.
// Playback and the effects engine decode the asset length and render against
// the tokio clock, raising the same events a hardware backend would.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backend::{
    AudioBackend, AudioFrame, AudioRoute, CaptureFormat, CaptureSettings, DeviceEvent,
    DeviceEventSender, EffectsEngine, Player, Recorder, StreamFormat,
};
use super::file::AssetInfo;
use crate::effects::{Pipeline, StageKind};

/// Level reported for digital silence or when metering is off
pub const SILENCE_DB: f32 = -160.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Average power of a frame in dBFS
pub fn frame_level_db(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return SILENCE_DB;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / i16::MAX as f64;
            v * v
        })
        .sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();

    if rms <= 0.0 {
        SILENCE_DB
    } else {
        ((20.0 * rms.log10()) as f32).max(SILENCE_DB)
    }
}

/// Backend that needs no audio hardware
pub struct HeadlessBackend {
    input: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
    route: Mutex<AudioRoute>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(None),
            route: Mutex::new(AudioRoute::Inactive),
        }
    }

    /// Connect a fresh capture input, replacing any unused one
    ///
    /// The next recorder takes ownership of the receiving end. Dropping the
    /// sender ends that capture as if the device had stopped on its own.
    pub fn connect_input(&self, buffer: usize) -> mpsc::Sender<AudioFrame> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        *lock(&self.input) = Some(rx);
        tx
    }

    /// Last route negotiated through `set_route`
    pub fn route(&self) -> AudioRoute {
        *lock(&self.route)
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AudioBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn container_extension(&self) -> &str {
        "wav"
    }

    async fn set_route(&self, route: AudioRoute) -> Result<()> {
        debug!("Headless route: {:?}", route);
        *lock(&self.route) = route;
        Ok(())
    }

    async fn open_recorder(
        &self,
        destination: &Path,
        settings: &CaptureSettings,
        events: DeviceEventSender,
    ) -> Result<Box<dyn Recorder>> {
        let input = lock(&self.input)
            .take()
            .context("No capture input connected")?;

        let recorder = WavRecorder::create(destination, settings.clone(), input, events)?;
        Ok(Box::new(recorder))
    }

    async fn open_player(
        &self,
        source: &Path,
        events: DeviceEventSender,
    ) -> Result<Box<dyn Player>> {
        let info = AssetInfo::probe(source)?;
        Ok(Box::new(ClockedPlayer::new(info, events)))
    }

    async fn open_effects_engine(
        &self,
        source: &Path,
        _events: DeviceEventSender,
    ) -> Result<Box<dyn EffectsEngine>> {
        let info = AssetInfo::probe(source)?;
        Ok(Box::new(ClockedEffectsEngine::new(info)))
    }
}

// ============================================================================
// Capture
// ============================================================================

struct CaptureShared {
    file: Option<File>,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    spec: hound::WavSpec,
    samples_written: u64,
    last_level_db: f32,
}

impl CaptureShared {
    fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if self.writer.is_none() {
            self.spec.sample_rate = frame.sample_rate;
            self.spec.channels = frame.channels;
            self.open_writer()?;
        } else if frame.sample_rate != self.spec.sample_rate || frame.channels != self.spec.channels
        {
            bail!(
                "Frame format changed mid-capture: {}Hz/{}ch, expected {}Hz/{}ch",
                frame.sample_rate,
                frame.channels,
                self.spec.sample_rate,
                self.spec.channels
            );
        }

        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
        }

        self.samples_written += frame.samples.len() as u64;
        self.last_level_db = frame_level_db(&frame.samples);
        Ok(())
    }

    fn open_writer(&mut self) -> Result<()> {
        let file = self.file.take().context("Capture file already closed")?;
        let writer = hound::WavWriter::new(BufWriter::new(file), self.spec)
            .context("Failed to start WAV stream")?;
        self.writer = Some(writer);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Nothing captured still leaves a valid, empty WAV behind
        if self.writer.is_none() && self.file.is_some() {
            self.open_writer()?;
        }
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }
        Ok(())
    }

    fn elapsed(&self) -> Duration {
        let per_second = self.spec.sample_rate as f64 * self.spec.channels.max(1) as f64;
        if per_second <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples_written as f64 / per_second)
    }
}

/// Capture device writing 16-bit PCM WAV
struct WavRecorder {
    path: PathBuf,
    settings: CaptureSettings,
    shared: Arc<Mutex<CaptureShared>>,
    input: Option<mpsc::Receiver<AudioFrame>>,
    events: DeviceEventSender,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl WavRecorder {
    fn create(
        destination: &Path,
        settings: CaptureSettings,
        input: mpsc::Receiver<AudioFrame>,
        events: DeviceEventSender,
    ) -> Result<Self> {
        if settings.format != CaptureFormat::Pcm {
            warn!(
                "Headless capture encodes {:?} requests as 16-bit PCM WAV",
                settings.format
            );
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = File::create(destination)
            .with_context(|| format!("Failed to create capture file: {}", destination.display()))?;

        let spec = hound::WavSpec {
            channels: settings.channels,
            sample_rate: settings.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        info!(
            "Headless recorder prepared: {} ({}Hz, {} channels)",
            destination.display(),
            settings.sample_rate,
            settings.channels
        );

        Ok(Self {
            path: destination.to_path_buf(),
            settings,
            shared: Arc::new(Mutex::new(CaptureShared {
                file: Some(file),
                writer: None,
                spec,
                samples_written: 0,
                last_level_db: SILENCE_DB,
            })),
            input: Some(input),
            events,
            stop_tx: None,
        })
    }
}

impl Recorder for WavRecorder {
    fn record(&mut self) -> Result<()> {
        let mut input = self.input.take().context("Recorder already started")?;
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        let path = self.path.clone();

        tokio::spawn(async move {
            let mut successfully = true;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    frame = input.recv() => match frame {
                        Some(frame) => {
                            let written = lock(&shared).write_frame(&frame);
                            if let Err(e) = written {
                                error!("Capture encode error: {:#}", e);
                                events.send(DeviceEvent::EncodeError(format!("{:#}", e)));
                                successfully = false;
                                break;
                            }
                        }
                        None => {
                            info!("Capture input closed");
                            break;
                        }
                    },
                }
            }

            let finished = lock(&shared).finish();
            if let Err(e) = finished {
                error!("Failed to finish {}: {:#}", path.display(), e);
                events.send(DeviceEvent::EncodeError(format!("{:#}", e)));
                successfully = false;
            }

            events.send(DeviceEvent::RecordingFinished { successfully });
        });

        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    fn current_time(&self) -> Duration {
        lock(&self.shared).elapsed()
    }

    fn average_power(&mut self) -> f32 {
        if !self.settings.metering_enabled {
            return SILENCE_DB;
        }
        lock(&self.shared).last_level_db
    }

    fn stop(&mut self) -> Result<()> {
        match self.stop_tx.take() {
            Some(tx) => {
                // The task may already have ended because the input closed
                let _ = tx.send(());
                Ok(())
            }
            None => bail!("Recorder is not capturing"),
        }
    }
}

// ============================================================================
// Playback
// ============================================================================

/// Tracks a render head moving at `rate` × real time
struct RenderClock {
    length: Duration,
    position: Duration,
    started_at: Option<Instant>,
    rate: f64,
}

impl RenderClock {
    fn new(length: Duration) -> Self {
        Self {
            length,
            position: Duration::ZERO,
            started_at: None,
            rate: 1.0,
        }
    }

    fn position(&self) -> Duration {
        let running = self
            .started_at
            .map(|t| t.elapsed().mul_f64(self.rate))
            .unwrap_or_default();
        (self.position + running).min(self.length)
    }

    fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn halt(&mut self) {
        self.position = self.position();
        self.started_at = None;
    }

    fn reset(&mut self) {
        self.position = Duration::ZERO;
        self.started_at = None;
    }

    fn seek(&mut self, position: Duration) {
        self.position = position.min(self.length);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn remaining_real_time(&self) -> Duration {
        self.length
            .saturating_sub(self.position())
            .div_f64(self.rate)
    }
}

/// Plays an asset against the tokio clock and reports when it runs out
struct ClockedPlayer {
    info: AssetInfo,
    clock: RenderClock,
    events: DeviceEventSender,
    finish_task: Option<JoinHandle<()>>,
}

impl ClockedPlayer {
    fn new(info: AssetInfo, events: DeviceEventSender) -> Self {
        Self {
            clock: RenderClock::new(info.duration),
            info,
            events,
            finish_task: None,
        }
    }

    fn cancel_finish(&mut self) {
        if let Some(task) = self.finish_task.take() {
            task.abort();
        }
    }

    fn schedule_finish(&mut self) {
        self.cancel_finish();
        let remaining = self.clock.remaining_real_time();
        let events = self.events.clone();
        self.finish_task = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            events.send(DeviceEvent::PlaybackFinished { successfully: true });
        }));
    }
}

impl Player for ClockedPlayer {
    fn duration(&self) -> Duration {
        self.info.duration
    }

    fn seek(&mut self, position: Duration) {
        self.clock.seek(position);
        if self.finish_task.is_some() {
            self.schedule_finish();
        }
    }

    fn play(&mut self) -> Result<()> {
        self.clock.start();
        self.schedule_finish();
        Ok(())
    }

    fn pause(&mut self) {
        self.cancel_finish();
        self.clock.halt();
    }

    fn stop(&mut self) {
        self.cancel_finish();
        self.clock.reset();
    }
}

impl Drop for ClockedPlayer {
    fn drop(&mut self) {
        self.cancel_finish();
    }
}

/// Effects engine that validates the pipeline and renders at the rate factor
struct ClockedEffectsEngine {
    info: AssetInfo,
    clock: RenderClock,
}

impl ClockedEffectsEngine {
    fn new(info: AssetInfo) -> Self {
        Self {
            clock: RenderClock::new(info.duration),
            info,
        }
    }
}

impl EffectsEngine for ClockedEffectsEngine {
    fn format(&self) -> StreamFormat {
        self.info.format
    }

    fn total_length(&self) -> Duration {
        self.info.duration
    }

    fn render_position(&self) -> Duration {
        self.clock.position()
    }

    fn start(&mut self, pipeline: &Pipeline) -> Result<()> {
        let kinds = pipeline.kinds();
        if kinds.first() != Some(&StageKind::Source) || kinds.last() != Some(&StageKind::Output)
        {
            bail!("playSound failed: pipeline must run from source to output");
        }
        if let Some(conn) = pipeline.connections().find(|c| c.format != self.info.format) {
            bail!(
                "playSound failed: {:?} -> {:?} uses {:?}, source is {:?}",
                conn.from,
                conn.to,
                conn.format,
                self.info.format
            );
        }

        for conn in pipeline.connections() {
            debug!("Connected {:?} -> {:?}", conn.from, conn.to);
        }

        self.clock.rate = pipeline.rate().map(f64::from).unwrap_or(1.0);
        self.clock.start();
        Ok(())
    }

    fn pause(&mut self) {
        self.clock.halt();
    }

    fn stop(&mut self) {
        self.clock.reset();
    }
}
