// Shared test doubles: a scripted audio backend and a recording observer

#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use voice_session::audio::{
    AudioBackend, AudioRoute, CaptureSettings, DeviceEvent, DeviceEventSender, EffectsEngine,
    Player, Recorder, StreamFormat,
};
use voice_session::effects::{Pipeline, StageKind};
use voice_session::{ErrorEvent, ErrorKind, Observer, SessionConfig, StopKind};

pub const ASSET_FORMAT: StreamFormat = StreamFormat {
    sample_rate: 44100,
    channels: 2,
};

/// Knobs the test turns before or during a scenario
#[derive(Debug, Default)]
pub struct Script {
    pub recorder_init_fails: bool,
    pub recorder_elapsed: Duration,
    pub level_db: f32,
    pub assets: HashMap<PathBuf, Duration>,
    pub effects_start_fails: bool,
    pub effects_position: Duration,
}

/// What the session asked the backend to do
#[derive(Debug, Default)]
pub struct Journal {
    pub routes: Vec<AudioRoute>,
    pub meter_reads: usize,
    pub recorder_stops: usize,
    pub plays: usize,
    pub pauses: usize,
    pub player_stops: usize,
    pub seeks: Vec<Duration>,
    pub pipelines: Vec<Vec<StageKind>>,
    pub recorder_events: Option<DeviceEventSender>,
    pub player_events: Option<DeviceEventSender>,
}

#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(self, path: impl Into<PathBuf>, length: Duration) -> Self {
        self.script().assets.insert(path.into(), length);
        self
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    /// Raise an event from the most recently opened capture device
    pub fn recorder_event(&self, event: DeviceEvent) {
        let sender = self.journal().recorder_events.clone();
        sender.expect("no recorder opened").send(event);
    }

    /// Raise an event from the most recently opened player or engine
    pub fn player_event(&self, event: DeviceEvent) {
        let sender = self.journal().player_events.clone();
        sender.expect("no player opened").send(event);
    }

    pub fn last_route(&self) -> Option<AudioRoute> {
        self.journal().routes.last().copied()
    }
}

#[async_trait::async_trait]
impl AudioBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn container_extension(&self) -> &str {
        "m4a"
    }

    async fn set_route(&self, route: AudioRoute) -> Result<()> {
        self.journal().routes.push(route);
        Ok(())
    }

    async fn open_recorder(
        &self,
        _destination: &Path,
        _settings: &CaptureSettings,
        events: DeviceEventSender,
    ) -> Result<Box<dyn Recorder>> {
        if self.script().recorder_init_fails {
            bail!("capture device unavailable");
        }
        self.journal().recorder_events = Some(events.clone());
        Ok(Box::new(ScriptedRecorder {
            script: Arc::clone(&self.script),
            journal: Arc::clone(&self.journal),
            events,
        }))
    }

    async fn open_player(
        &self,
        source: &Path,
        events: DeviceEventSender,
    ) -> Result<Box<dyn Player>> {
        let length = *self
            .script()
            .assets
            .get(source)
            .with_context(|| format!("no such asset: {}", source.display()))?;
        self.journal().player_events = Some(events);
        Ok(Box::new(ScriptedPlayer {
            length,
            journal: Arc::clone(&self.journal),
        }))
    }

    async fn open_effects_engine(
        &self,
        source: &Path,
        events: DeviceEventSender,
    ) -> Result<Box<dyn EffectsEngine>> {
        let length = *self
            .script()
            .assets
            .get(source)
            .with_context(|| format!("no such asset: {}", source.display()))?;
        self.journal().player_events = Some(events);
        Ok(Box::new(ScriptedEngine {
            length,
            script: Arc::clone(&self.script),
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct ScriptedRecorder {
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Journal>>,
    events: DeviceEventSender,
}

impl Recorder for ScriptedRecorder {
    fn record(&mut self) -> Result<()> {
        Ok(())
    }

    fn current_time(&self) -> Duration {
        self.script.lock().unwrap().recorder_elapsed
    }

    fn average_power(&mut self) -> f32 {
        self.journal.lock().unwrap().meter_reads += 1;
        self.script.lock().unwrap().level_db
    }

    fn stop(&mut self) -> Result<()> {
        self.journal.lock().unwrap().recorder_stops += 1;
        // Like a hardware recorder, stopping raises the finish notification
        self.events
            .send(DeviceEvent::RecordingFinished { successfully: true });
        Ok(())
    }
}

struct ScriptedPlayer {
    length: Duration,
    journal: Arc<Mutex<Journal>>,
}

impl Player for ScriptedPlayer {
    fn duration(&self) -> Duration {
        self.length
    }

    fn seek(&mut self, position: Duration) {
        self.journal.lock().unwrap().seeks.push(position);
    }

    fn play(&mut self) -> Result<()> {
        self.journal.lock().unwrap().plays += 1;
        Ok(())
    }

    fn pause(&mut self) {
        self.journal.lock().unwrap().pauses += 1;
    }

    fn stop(&mut self) {
        self.journal.lock().unwrap().player_stops += 1;
    }
}

struct ScriptedEngine {
    length: Duration,
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Journal>>,
}

impl EffectsEngine for ScriptedEngine {
    fn format(&self) -> StreamFormat {
        ASSET_FORMAT
    }

    fn total_length(&self) -> Duration {
        self.length
    }

    fn render_position(&self) -> Duration {
        self.script.lock().unwrap().effects_position
    }

    fn start(&mut self, pipeline: &Pipeline) -> Result<()> {
        self.journal.lock().unwrap().pipelines.push(pipeline.kinds());
        if self.script.lock().unwrap().effects_start_fails {
            bail!("playSound failed");
        }
        self.journal.lock().unwrap().plays += 1;
        Ok(())
    }

    fn pause(&mut self) {
        self.journal.lock().unwrap().pauses += 1;
    }

    fn stop(&mut self) {
        self.journal.lock().unwrap().player_stops += 1;
    }
}

/// Everything an observer was told
#[derive(Debug, Default)]
pub struct Notifications {
    pub meters: Vec<f32>,
    pub record_finishes: Vec<bool>,
    pub stops: Vec<StopKind>,
    pub errors: Vec<ErrorEvent>,
}

impl Notifications {
    pub fn error_kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(|e| e.kind).collect()
    }
}

/// Observer with every handler registered
pub fn full_observer() -> (Arc<Observer>, Arc<Mutex<Notifications>>) {
    let log = Arc::new(Mutex::new(Notifications::default()));
    let (meters, finishes, stops, errors) = (log.clone(), log.clone(), log.clone(), log.clone());

    let observer = Observer::new()
        .on_meter(move |db| meters.lock().unwrap().meters.push(db))
        .on_record_finished(move |ok| finishes.lock().unwrap().record_finishes.push(ok))
        .on_playback_stopped(move |kind| stops.lock().unwrap().stops.push(kind))
        .on_error(move |event| errors.lock().unwrap().errors.push(event));

    (Arc::new(observer), log)
}

/// Observer that only cares about errors
pub fn error_observer() -> (Arc<Observer>, Arc<Mutex<Notifications>>) {
    let log = Arc::new(Mutex::new(Notifications::default()));
    let errors = log.clone();
    let observer = Observer::new().on_error(move |event| errors.lock().unwrap().errors.push(event));
    (Arc::new(observer), log)
}

pub fn test_config(documents_dir: impl Into<PathBuf>) -> SessionConfig {
    SessionConfig {
        session_id: "test-session".to_string(),
        documents_dir: documents_dir.into(),
        ..SessionConfig::default()
    }
}

/// Let the session drain any queued device events
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
