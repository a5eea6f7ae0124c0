use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use super::clock::{ClockMode, ProgressClock, Timeline};
use super::config::SessionConfig;
use super::observer::Notifier;
use crate::audio::{AudioBackend, AudioRoute, DeviceEventSender, TaggedEvent};

/// State shared by the recording and playback halves of a session
///
/// Owned by the session actor; nothing else touches it.
pub(crate) struct SessionContext {
    pub config: SessionConfig,
    pub backend: Arc<dyn AudioBackend>,
    pub clock: ProgressClock,
    pub timeline: Timeline,
    pub notifier: Notifier,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    next_generation: u64,
}

impl SessionContext {
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn AudioBackend>,
        events_tx: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        Self {
            clock: ProgressClock::new(config.clock),
            config,
            backend,
            timeline: Timeline::default(),
            notifier: Notifier::new(),
            events_tx,
            next_generation: 1,
        }
    }

    /// Event handle for a newly opened device
    pub fn device_events(&mut self) -> DeviceEventSender {
        let generation = self.next_generation;
        self.next_generation += 1;
        DeviceEventSender::new(generation, self.events_tx.clone())
    }

    /// Disarm the clock if it is timing `mode`, then snap that mode's time
    pub fn finish_clock(&mut self, mode: ClockMode) {
        if self.clock.mode() == Some(mode) {
            self.clock.disarm(&mut self.timeline);
        }
        self.timeline.snap(mode);
    }

    /// Media position matching `ticks` of the playback clock
    pub fn playback_offset(&self, ticks: u64) -> Duration {
        let tick_ms = self.clock.tick_interval(ClockMode::Playback).as_millis() as u64;
        Duration::from_millis(tick_ms.saturating_mul(ticks))
    }

    /// Route changes outside a start are best effort
    pub async fn release_route(&self) {
        if let Err(e) = self.backend.set_route(AudioRoute::Inactive).await {
            warn!(
                "[{}] Failed to deactivate audio route: {:#}",
                self.config.session_id, e
            );
        }
    }
}
