use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use super::error::{ErrorEvent, ErrorKind};

/// Why playback stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopKind {
    Pause,
    Manual,
    Auto,
}

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Application callbacks, each one optional
///
/// Register only the handlers you care about:
///
/// ```rust,ignore
/// let observer = Arc::new(
///     Observer::new()
///         .on_meter(|db| println!("level {db:.1} dB"))
///         .on_error(|event| eprintln!("{event}")),
/// );
/// session.set_observer(&observer).await?;
/// ```
///
/// The session keeps only a weak reference; dropping the `Arc` unregisters it.
#[derive(Clone, Default)]
pub struct Observer {
    meter: Option<Handler<f32>>,
    record_finished: Option<Handler<bool>>,
    playback_stopped: Option<Handler<StopKind>>,
    error: Option<Handler<ErrorEvent>>,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input level in dB, once per recording tick
    pub fn on_meter(mut self, f: impl Fn(f32) + Send + Sync + 'static) -> Self {
        self.meter = Some(Arc::new(f));
        self
    }

    /// Capture ended; the flag says whether it ended cleanly
    pub fn on_record_finished(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.record_finished = Some(Arc::new(f));
        self
    }

    pub fn on_playback_stopped(mut self, f: impl Fn(StopKind) + Send + Sync + 'static) -> Self {
        self.playback_stopped = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(ErrorEvent) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn wants_meter(&self) -> bool {
        self.meter.is_some()
    }
}

/// Delivers notifications to the registered observer, if it is still alive
/// and has a handler for the notification
#[derive(Default)]
pub struct Notifier {
    observer: Option<Weak<Observer>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_observer(&mut self, observer: Option<Weak<Observer>>) {
        self.observer = observer;
    }

    fn upgrade(&self) -> Option<Arc<Observer>> {
        self.observer.as_ref().and_then(Weak::upgrade)
    }

    /// Whether a live observer wants meter samples
    pub fn wants_meter(&self) -> bool {
        self.upgrade().map(|o| o.wants_meter()).unwrap_or(false)
    }

    pub fn meter(&self, db: f32) {
        if let Some(handler) = self.upgrade().and_then(|o| o.meter.clone()) {
            handler(db);
        }
    }

    pub fn record_finished(&self, successfully: bool) {
        if let Some(handler) = self.upgrade().and_then(|o| o.record_finished.clone()) {
            handler(successfully);
        }
    }

    pub fn playback_stopped(&self, kind: StopKind) {
        if let Some(handler) = self.upgrade().and_then(|o| o.playback_stopped.clone()) {
            handler(kind);
        }
    }

    /// Report a failure and hand it back for the caller's outcome
    pub fn report(&self, event: ErrorEvent) -> ErrorEvent {
        warn!("Session error: {}", event);
        match self.upgrade().and_then(|o| o.error.clone()) {
            Some(handler) => handler(event.clone()),
            None => debug!("No error handler registered, {} not delivered", event.kind),
        }
        event
    }

    pub fn report_kind(&self, kind: ErrorKind, context: impl Into<String>) -> ErrorEvent {
        self.report(ErrorEvent::new(kind, context))
    }
}
