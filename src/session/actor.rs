use chrono::Utc;
use futures::future::OptionFuture;
use std::path::PathBuf;
use std::sync::Weak;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, info};

use super::clock::ClockMode;
use super::context::SessionContext;
use super::error::SessionError;
use super::observer::Observer;
use super::playback::{PlaybackSession, PlaybackState};
use super::recording::{RecordingSession, RecordingState};
use super::stats::{Activity, SessionSnapshot};
use crate::audio::TaggedEvent;
use crate::effects::EffectsConfig;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Requests handled by the session actor
pub(crate) enum Command {
    SetObserver {
        observer: Option<Weak<Observer>>,
        reply: oneshot::Sender<()>,
    },
    StartRecording {
        destination: Option<PathBuf>,
        reply: Reply<PathBuf>,
    },
    StopRecording {
        reply: Reply<u64>,
    },
    Play {
        source: Option<PathBuf>,
        reply: Reply<()>,
    },
    PlayWithEffects {
        source: Option<PathBuf>,
        config: EffectsConfig,
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    StopPlayback {
        reply: Reply<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Single writer of all session state
///
/// Caller commands, device events, clock ticks and effects completion all
/// arrive here and are applied one at a time.
pub(crate) struct SessionActor {
    ctx: SessionContext,
    recording: RecordingSession,
    playback: PlaybackSession,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedReceiver<TaggedEvent>,
}

impl SessionActor {
    pub fn new(
        ctx: SessionContext,
        commands: mpsc::Receiver<Command>,
        events: mpsc::UnboundedReceiver<TaggedEvent>,
    ) -> Self {
        Self {
            ctx,
            recording: RecordingSession::new(),
            playback: PlaybackSession::new(),
            commands,
            events,
        }
    }

    pub async fn run(mut self) {
        info!(
            "[{}] Session actor started (backend: {})",
            self.ctx.config.session_id,
            self.ctx.backend.name()
        );

        loop {
            let completion: OptionFuture<_> =
                self.playback.completion_at().map(time::sleep_until).into();

            tokio::select! {
                // Device events and timers first, so a command always sees
                // every notification that was already queued
                biased;

                Some(tagged) = self.events.recv() => self.on_device_event(tagged).await,
                Some(()) = completion => {
                    debug!("[{}] Effects render complete", self.ctx.config.session_id);
                    self.playback.finish_auto(&mut self.ctx);
                }
                mode = self.ctx.clock.tick() => self.on_tick(mode),
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
            }
        }

        info!("[{}] Session actor stopped", self.ctx.config.session_id);
    }

    /// Apply one command; returns false once the session should end
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::SetObserver { observer, reply } => {
                self.ctx.notifier.set_observer(observer);
                let _ = reply.send(());
            }
            Command::StartRecording { destination, reply } => {
                let _ = reply.send(self.start_recording(destination).await);
            }
            Command::StopRecording { reply } => {
                let result = self.recording.stop(&mut self.ctx).await;
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Command::Play { source, reply } => {
                let result = match self.check_playback_allowed() {
                    Ok(()) => {
                        let fallback = self.recording.last_recording().map(PathBuf::from);
                        self.playback
                            .play(&mut self.ctx, source, fallback.as_deref())
                            .await
                            .map_err(SessionError::from)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::PlayWithEffects {
                source,
                config,
                reply,
            } => {
                let result = match self.check_playback_allowed() {
                    Ok(()) => {
                        let fallback = self.recording.last_recording().map(PathBuf::from);
                        self.playback
                            .play_with_effects(&mut self.ctx, source, fallback.as_deref(), config)
                            .await
                            .map_err(SessionError::from)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::Pause { reply } => {
                let result = self.playback.pause(&mut self.ctx);
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Command::StopPlayback { reply } => {
                let result = self.playback.stop(&mut self.ctx);
                let _ = reply.send(result.map_err(SessionError::from));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown { reply } => {
                self.teardown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn start_recording(
        &mut self,
        destination: Option<PathBuf>,
    ) -> Result<PathBuf, SessionError> {
        if self.recording.state() == RecordingState::Recording {
            return Err(SessionError::Busy {
                active: Activity::Recording,
            });
        }
        if self.playback.state() == PlaybackState::Playing {
            info!(
                "[{}] Recording rejected: playback in progress",
                self.ctx.config.session_id
            );
            return Err(SessionError::Busy {
                active: Activity::Playback,
            });
        }

        let path = self.recording.start(&mut self.ctx, destination).await?;

        // A paused asset cannot be resumed across a new recording
        if self.playback.state() == PlaybackState::Paused {
            let _ = self.playback.stop(&mut self.ctx);
        }

        Ok(path)
    }

    fn check_playback_allowed(&self) -> Result<(), SessionError> {
        if self.recording.state() == RecordingState::Recording {
            info!(
                "[{}] Playback rejected: recording in progress",
                self.ctx.config.session_id
            );
            return Err(SessionError::Busy {
                active: Activity::Recording,
            });
        }
        Ok(())
    }

    fn on_tick(&mut self, mode: ClockMode) {
        if self.ctx.clock.advance(&mut self.ctx.timeline).is_none() {
            return;
        }
        if mode == ClockMode::Recording {
            self.recording.sample_meter(&self.ctx);
        }
    }

    async fn on_device_event(&mut self, tagged: TaggedEvent) {
        if self.recording.owns(tagged.generation) {
            self.recording
                .on_device_event(&mut self.ctx, tagged.event)
                .await;
        } else if self.playback.owns(tagged.generation) {
            self.playback.on_device_event(&mut self.ctx, tagged.event);
        } else {
            debug!(
                "[{}] Dropping stale device event (generation {}): {:?}",
                self.ctx.config.session_id, tagged.generation, tagged.event
            );
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let timeline = self.ctx.timeline;
        SessionSnapshot {
            session_id: self.ctx.config.session_id.clone(),
            recording_state: self.recording.state(),
            playback_state: self.playback.state(),
            recording_current_time: timeline.recording_current_time,
            recording_duration: timeline.recording_duration,
            playing_current_time: timeline.playing_current_time,
            playing_duration: timeline.playing_duration,
            elapsed_ticks: self.ctx.clock.elapsed_ticks(),
            clock_mode: self.ctx.clock.mode(),
            last_recording: self.recording.last_recording().map(PathBuf::from),
            taken_at: Utc::now(),
        }
    }

    async fn teardown(&mut self) {
        info!("[{}] Shutting down session", self.ctx.config.session_id);

        if self.recording.state() == RecordingState::Recording {
            let _ = self.recording.stop(&mut self.ctx).await;
        }
        if matches!(
            self.playback.state(),
            PlaybackState::Playing | PlaybackState::Paused
        ) {
            let _ = self.playback.stop(&mut self.ctx);
        }
        self.ctx.release_route().await;
    }
}
