use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::clock::ClockMode;
use super::context::SessionContext;
use super::error::{ErrorEvent, ErrorKind};
use crate::audio::{AudioRoute, DeviceEvent, Recorder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// Capture half of a session
pub(crate) struct RecordingSession {
    state: RecordingState,
    recorder: Option<Box<dyn Recorder>>,
    /// Generation of the current capture device
    generation: Option<u64>,
    /// Whether that device's finish has been forwarded already
    finish_forwarded: bool,
    last_recording: Option<PathBuf>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            state: RecordingState::Idle,
            recorder: None,
            generation: None,
            finish_forwarded: false,
            last_recording: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn last_recording(&self) -> Option<&Path> {
        self.last_recording.as_deref()
    }

    /// Prepare a capture device and start recording into `destination`
    pub async fn start(
        &mut self,
        ctx: &mut SessionContext,
        destination: Option<PathBuf>,
    ) -> Result<PathBuf, ErrorEvent> {
        let path = destination.unwrap_or_else(|| {
            ctx.config
                .default_recording_path(ctx.backend.container_extension())
        });

        info!(
            "[{}] Starting recording: {}",
            ctx.config.session_id,
            path.display()
        );

        ctx.timeline.recording_duration = 0;

        if let Err(e) = ctx
            .backend
            .set_route(AudioRoute::PlayAndRecord {
                default_to_speaker: true,
            })
            .await
        {
            return Err(ctx
                .notifier
                .report(ErrorEvent::from_error(ErrorKind::RecorderInitFailed, &e)));
        }

        let events = ctx.device_events();
        let generation = events.generation();

        let mut recorder = match ctx
            .backend
            .open_recorder(&path, &ctx.config.capture, events)
            .await
        {
            Ok(recorder) => recorder,
            Err(e) => {
                self.state = RecordingState::Idle;
                ctx.release_route().await;
                return Err(ctx
                    .notifier
                    .report(ErrorEvent::from_error(ErrorKind::RecorderInitFailed, &e)));
            }
        };

        if let Err(e) = recorder.record() {
            self.state = RecordingState::Idle;
            ctx.release_route().await;
            return Err(ctx
                .notifier
                .report(ErrorEvent::from_error(ErrorKind::RecorderInitFailed, &e)));
        }

        self.state = RecordingState::Recording;
        self.recorder = Some(recorder);
        self.generation = Some(generation);
        self.finish_forwarded = false;
        self.last_recording = Some(path.clone());

        ctx.timeline.recording_current_time = 0;
        ctx.clock.arm(ClockMode::Recording, 0);

        info!("[{}] Recording started", ctx.config.session_id);
        Ok(path)
    }

    /// Stop capture and return the recorded length in seconds
    pub async fn stop(&mut self, ctx: &mut SessionContext) -> Result<u64, ErrorEvent> {
        self.state = RecordingState::Idle;

        let Some(mut recorder) = self.recorder.take() else {
            ctx.timeline.recording_duration = 0;
            ctx.timeline.recording_current_time = 0;
            return Err(ctx
                .notifier
                .report_kind(ErrorKind::RecorderStopFailed, "no active capture device"));
        };

        ctx.timeline.recording_duration = recorder.current_time().as_secs();

        if let Err(e) = recorder.stop() {
            debug!(
                "[{}] Capture device already stopped: {:#}",
                ctx.config.session_id, e
            );
        }

        ctx.release_route().await;
        ctx.finish_clock(ClockMode::Recording);

        info!(
            "[{}] Recording stopped: {}s",
            ctx.config.session_id, ctx.timeline.recording_duration
        );

        Ok(ctx.timeline.recording_duration)
    }

    /// Forward the input level to the observer, if it asked for it
    pub fn sample_meter(&mut self, ctx: &SessionContext) {
        if !ctx.notifier.wants_meter() {
            return;
        }

        match self.recorder.as_mut() {
            Some(recorder) => ctx.notifier.meter(recorder.average_power()),
            None => {
                ctx.notifier
                    .report_kind(ErrorKind::RecorderIsNil, "meter sampled without a recorder");
            }
        }
    }

    pub fn owns(&self, generation: u64) -> bool {
        self.generation == Some(generation)
    }

    pub async fn on_device_event(&mut self, ctx: &mut SessionContext, event: DeviceEvent) {
        match event {
            DeviceEvent::RecordingFinished { successfully } => {
                if self.finish_forwarded {
                    debug!("[{}] Duplicate recording finish ignored", ctx.config.session_id);
                    return;
                }
                self.finish_forwarded = true;

                // Capture ended without a stop call: settle the same way stop does
                if self.state == RecordingState::Recording {
                    self.state = RecordingState::Idle;
                    if let Some(recorder) = &self.recorder {
                        ctx.timeline.recording_duration = recorder.current_time().as_secs();
                    }
                    ctx.release_route().await;
                    warn!(
                        "[{}] Capture ended on its own after {}s",
                        ctx.config.session_id, ctx.timeline.recording_duration
                    );
                }
                ctx.finish_clock(ClockMode::Recording);

                info!(
                    "[{}] Recording finished (successfully={})",
                    ctx.config.session_id, successfully
                );
                ctx.notifier.record_finished(successfully);
            }
            DeviceEvent::EncodeError(message) => {
                ctx.notifier.report_kind(ErrorKind::ENCODE_ERROR, message);
            }
            other => {
                debug!(
                    "[{}] Ignoring playback event from capture device: {:?}",
                    ctx.config.session_id, other
                );
            }
        }
    }
}
