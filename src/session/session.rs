use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use super::actor::{Command, SessionActor};
use super::config::SessionConfig;
use super::context::SessionContext;
use super::error::SessionError;
use super::observer::Observer;
use super::stats::SessionSnapshot;
use crate::audio::AudioBackend;
use crate::effects::EffectsConfig;

const COMMAND_BUFFER: usize = 32;

/// Handle to a running audio session
///
/// Cloning the handle is cheap; every clone talks to the same session.
/// Operations return once the session has applied them, with failures
/// both returned here and reported to the observer's error handler.
#[derive(Clone)]
pub struct AudioSession {
    session_id: String,
    commands: mpsc::Sender<Command>,
}

impl AudioSession {
    /// Start a session on the current tokio runtime
    pub fn spawn(config: SessionConfig, backend: Arc<dyn AudioBackend>) -> Self {
        let session_id = config.session_id.clone();
        info!(
            "Creating audio session: {} (backend: {})",
            session_id,
            backend.name()
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let ctx = SessionContext::new(config, backend, event_tx);
        tokio::spawn(SessionActor::new(ctx, command_rx, event_rx).run());

        Self {
            session_id,
            commands: command_tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Register the observer; only a weak reference is kept
    pub async fn set_observer(&self, observer: &Arc<Observer>) -> Result<(), SessionError> {
        let observer = Some(Arc::downgrade(observer));
        self.request(|reply| Command::SetObserver { observer, reply })
            .await
    }

    pub async fn clear_observer(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::SetObserver {
            observer: None,
            reply,
        })
        .await
    }

    /// Start capturing into `destination`, or the default recording path
    ///
    /// Returns the path being written.
    pub async fn start_recording(
        &self,
        destination: Option<PathBuf>,
    ) -> Result<PathBuf, SessionError> {
        self.request(|reply| Command::StartRecording { destination, reply })
            .await?
    }

    /// Stop capturing; returns the recorded length in whole seconds
    pub async fn stop_recording(&self) -> Result<u64, SessionError> {
        self.request(|reply| Command::StopRecording { reply })
            .await?
    }

    /// Play `source`, or the most recent recording when `None`
    ///
    /// While paused, playing the same asset again resumes where it left off.
    pub async fn play(&self, source: Option<PathBuf>) -> Result<(), SessionError> {
        self.request(|reply| Command::Play { source, reply }).await?
    }

    /// Play through a rate/pitch, echo and reverb pipeline
    pub async fn play_with_effects(
        &self,
        source: Option<PathBuf>,
        config: EffectsConfig,
    ) -> Result<(), SessionError> {
        self.request(|reply| Command::PlayWithEffects {
            source,
            config,
            reply,
        })
        .await?
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Pause { reply }).await?
    }

    pub async fn stop_playback(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::StopPlayback { reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stop any activity, release the audio route and end the session
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
