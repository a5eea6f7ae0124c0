use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::clock::ClockMode;
use super::context::SessionContext;
use super::error::{ErrorEvent, ErrorKind};
use super::observer::StopKind;
use crate::audio::{AudioRoute, DeviceEvent, EffectsEngine, Player};
use crate::effects::{EffectsConfig, EffectsGraph, Pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    FinishedManual,
    FinishedAuto,
}

enum Output {
    Plain(Box<dyn Player>),
    Effects {
        engine: Box<dyn EffectsEngine>,
        pipeline: Pipeline,
    },
}

impl Output {
    fn pause(&mut self) {
        match self {
            Output::Plain(player) => player.pause(),
            Output::Effects { engine, .. } => engine.pause(),
        }
    }

    fn stop(&mut self) {
        match self {
            Output::Plain(player) => player.stop(),
            Output::Effects { engine, .. } => engine.stop(),
        }
    }
}

/// The decoded asset currently owned by the session
struct Loaded {
    source: PathBuf,
    generation: u64,
    output: Output,
}

/// Playback half of a session
pub(crate) struct PlaybackSession {
    state: PlaybackState,
    loaded: Option<Loaded>,
    /// Clock ticks counted when playback was last paused
    resume_ticks: u64,
    /// When an effects render is expected to run out
    completion_at: Option<Instant>,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            loaded: None,
            resume_ticks: 0,
            completion_at: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn completion_at(&self) -> Option<Instant> {
        self.completion_at
    }

    pub fn owns(&self, generation: u64) -> bool {
        self.loaded
            .as_ref()
            .map(|l| l.generation == generation)
            .unwrap_or(false)
    }

    fn resolve_source(
        ctx: &SessionContext,
        source: Option<PathBuf>,
        fallback: Option<&Path>,
    ) -> Result<PathBuf, ErrorEvent> {
        source
            .or_else(|| fallback.map(Path::to_path_buf))
            .ok_or_else(|| {
                ctx.notifier
                    .report_kind(ErrorKind::PlayFailed, "no source given and nothing recorded yet")
            })
    }

    fn is_resumable(&self, source: &Path) -> bool {
        self.state == PlaybackState::Paused
            && self
                .loaded
                .as_ref()
                .map(|l| l.source == source)
                .unwrap_or(false)
    }

    async fn claim_route(ctx: &mut SessionContext) -> Result<(), ErrorEvent> {
        ctx.backend
            .set_route(AudioRoute::Playback)
            .await
            .map_err(|e| {
                ctx.notifier
                    .report(ErrorEvent::from_error(ErrorKind::PlayFailed, &e))
            })
    }

    /// Play `source`, the last recording, or resume the paused asset
    pub async fn play(
        &mut self,
        ctx: &mut SessionContext,
        source: Option<PathBuf>,
        fallback: Option<&Path>,
    ) -> Result<(), ErrorEvent> {
        // No source while paused resumes the retained asset, whatever was recorded since
        if source.is_none() && self.state == PlaybackState::Paused && self.loaded.is_some() {
            Self::claim_route(ctx).await?;
            return self.resume(ctx).await;
        }

        let source = Self::resolve_source(ctx, source, fallback)?;
        Self::claim_route(ctx).await?;

        if self.is_resumable(&source) {
            return self.resume(ctx).await;
        }

        info!(
            "[{}] Starting playback: {}",
            ctx.config.session_id,
            source.display()
        );

        let events = ctx.device_events();
        let generation = events.generation();
        let mut player = ctx
            .backend
            .open_player(&source, events)
            .await
            .map_err(|e| {
                ctx.notifier
                    .report(ErrorEvent::from_error(ErrorKind::PlayFailed, &e))
            })?;

        let duration = player.duration().as_secs();
        player.play().map_err(|e| {
            ctx.notifier
                .report(ErrorEvent::from_error(ErrorKind::PlayFailed, &e))
        })?;

        self.replace(ctx, Loaded {
            source,
            generation,
            output: Output::Plain(player),
        });
        self.begin(ctx, duration);
        Ok(())
    }

    /// Play `source` through an effects pipeline built from `config`
    pub async fn play_with_effects(
        &mut self,
        ctx: &mut SessionContext,
        source: Option<PathBuf>,
        fallback: Option<&Path>,
        config: EffectsConfig,
    ) -> Result<(), ErrorEvent> {
        let source = Self::resolve_source(ctx, source, fallback)?;
        Self::claim_route(ctx).await?;

        info!(
            "[{}] Starting effects playback: {} ({:?})",
            ctx.config.session_id,
            source.display(),
            config
        );

        let events = ctx.device_events();
        let generation = events.generation();
        let mut engine = ctx
            .backend
            .open_effects_engine(&source, events)
            .await
            .map_err(|e| {
                ctx.notifier
                    .report(ErrorEvent::from_error(ErrorKind::PlayFailed, &e))
            })?;

        let pipeline = EffectsGraph::build(&config, engine.format());
        if let Err(e) = engine.start(&pipeline) {
            engine.stop();
            return Err(ctx
                .notifier
                .report(ErrorEvent::from_error(ErrorKind::EffectsStartFailed, &e)));
        }

        let duration = engine.total_length().as_secs();
        let remaining = pipeline.estimate_remaining(engine.total_length(), engine.render_position());

        self.replace(ctx, Loaded {
            source,
            generation,
            output: Output::Effects { engine, pipeline },
        });
        self.completion_at = Some(Instant::now() + remaining);
        debug!(
            "[{}] Effects render expected to finish in {:.2}s",
            ctx.config.session_id,
            remaining.as_secs_f64()
        );

        self.begin(ctx, duration);
        Ok(())
    }

    async fn resume(&mut self, ctx: &mut SessionContext) -> Result<(), ErrorEvent> {
        let offset = ctx.playback_offset(self.resume_ticks);
        let Some(loaded) = self.loaded.as_mut() else {
            return Err(ctx
                .notifier
                .report_kind(ErrorKind::PlayFailed, "paused asset was released"));
        };

        info!(
            "[{}] Resuming playback at {:.1}s",
            ctx.config.session_id,
            offset.as_secs_f64()
        );

        match &mut loaded.output {
            Output::Plain(player) => {
                player.seek(offset);
                player.play().map_err(|e| {
                    ctx.notifier
                        .report(ErrorEvent::from_error(ErrorKind::PlayFailed, &e))
                })?;
            }
            Output::Effects { engine, pipeline } => {
                engine.start(pipeline).map_err(|e| {
                    ctx.notifier
                        .report(ErrorEvent::from_error(ErrorKind::EffectsStartFailed, &e))
                })?;
                let remaining =
                    pipeline.estimate_remaining(engine.total_length(), engine.render_position());
                self.completion_at = Some(Instant::now() + remaining);
            }
        }

        self.state = PlaybackState::Playing;
        ctx.clock.arm(ClockMode::Playback, self.resume_ticks);
        Ok(())
    }

    /// Swap in a newly opened asset, releasing whatever was loaded before
    fn replace(&mut self, ctx: &mut SessionContext, next: Loaded) {
        if let Some(mut previous) = self.loaded.take() {
            debug!(
                "[{}] Releasing {} for new playback",
                ctx.config.session_id,
                previous.source.display()
            );
            previous.output.stop();
            if ctx.clock.mode() == Some(ClockMode::Playback) {
                ctx.clock.suspend();
            }
        }
        self.completion_at = None;
        self.loaded = Some(next);
    }

    fn begin(&mut self, ctx: &mut SessionContext, duration: u64) {
        ctx.timeline.playing_duration = duration;
        ctx.timeline.playing_current_time = 0;
        self.resume_ticks = 0;
        self.state = PlaybackState::Playing;
        ctx.clock.arm(ClockMode::Playback, 0);

        info!(
            "[{}] Playback started ({}s)",
            ctx.config.session_id, duration
        );
    }

    /// Halt playback, keeping the asset for a later resume
    pub fn pause(&mut self, ctx: &mut SessionContext) -> Result<(), ErrorEvent> {
        let loaded = match self.loaded.as_mut() {
            Some(loaded) if self.state == PlaybackState::Playing => loaded,
            _ => {
                return Err(ctx
                    .notifier
                    .report_kind(ErrorKind::PlayStopFailed, "nothing is playing"));
            }
        };

        loaded.output.pause();
        self.completion_at = None;
        self.resume_ticks = ctx
            .clock
            .suspend()
            .unwrap_or_else(|| ctx.clock.elapsed_ticks());
        self.state = PlaybackState::Paused;

        info!(
            "[{}] Playback paused at tick {}",
            ctx.config.session_id, self.resume_ticks
        );
        ctx.notifier.playback_stopped(StopKind::Pause);
        Ok(())
    }

    /// Stop and release the asset
    pub fn stop(&mut self, ctx: &mut SessionContext) -> Result<(), ErrorEvent> {
        let active = matches!(self.state, PlaybackState::Playing | PlaybackState::Paused);
        let mut loaded = match self.loaded.take() {
            Some(loaded) if active => loaded,
            other => {
                self.loaded = other;
                return Err(ctx
                    .notifier
                    .report_kind(ErrorKind::PlayStopFailed, "nothing is playing or paused"));
            }
        };

        loaded.output.stop();
        self.settle(ctx, PlaybackState::FinishedManual);
        ctx.notifier.playback_stopped(StopKind::Manual);
        Ok(())
    }

    /// The asset ran out
    pub fn finish_auto(&mut self, ctx: &mut SessionContext) {
        if self.state != PlaybackState::Playing {
            debug!(
                "[{}] Completion ignored in state {:?}",
                ctx.config.session_id, self.state
            );
            return;
        }

        if let Some(mut loaded) = self.loaded.take() {
            loaded.output.stop();
        }
        self.settle(ctx, PlaybackState::FinishedAuto);
        ctx.notifier.playback_stopped(StopKind::Auto);
    }

    fn settle(&mut self, ctx: &mut SessionContext, state: PlaybackState) {
        self.completion_at = None;
        self.resume_ticks = 0;
        ctx.finish_clock(ClockMode::Playback);
        self.state = state;

        info!(
            "[{}] Playback ended: {:?} at {}s",
            ctx.config.session_id, state, ctx.timeline.playing_current_time
        );
    }

    pub fn on_device_event(&mut self, ctx: &mut SessionContext, event: DeviceEvent) {
        match event {
            DeviceEvent::PlaybackFinished { successfully } => {
                if !successfully {
                    warn!(
                        "[{}] Player reported an unsuccessful finish",
                        ctx.config.session_id
                    );
                }
                self.finish_auto(ctx);
            }
            DeviceEvent::DecodeError(message) => {
                ctx.notifier.report_kind(ErrorKind::PlayDecodeError, message);
            }
            other => {
                debug!(
                    "[{}] Ignoring capture event from player: {:?}",
                    ctx.config.session_id, other
                );
            }
        }
    }
}
