use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant, Interval};
use tracing::debug;

use super::config::ClockConfig;

/// Which activity the progress clock is timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockMode {
    Recording,
    Playback,
}

/// Elapsed and total times, in whole seconds
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub recording_current_time: u64,
    pub recording_duration: u64,
    pub playing_current_time: u64,
    pub playing_duration: u64,
}

impl Timeline {
    /// Force the displayed elapsed time onto the final duration
    pub fn snap(&mut self, mode: ClockMode) {
        match mode {
            ClockMode::Recording => self.recording_current_time = self.recording_duration,
            ClockMode::Playback => self.playing_current_time = self.playing_duration,
        }
    }
}

struct Armed {
    mode: ClockMode,
    interval: Interval,
}

/// Periodic progress clock
///
/// At most one timer exists at a time. Arming an armed clock does nothing,
/// so a second `start`/`play` can never double-schedule ticks.
pub struct ProgressClock {
    config: ClockConfig,
    armed: Option<Armed>,
    elapsed_ticks: u64,
}

impl ProgressClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            armed: None,
            elapsed_ticks: 0,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn mode(&self) -> Option<ClockMode> {
        self.armed.as_ref().map(|a| a.mode)
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.elapsed_ticks
    }

    pub fn tick_interval(&self, mode: ClockMode) -> std::time::Duration {
        match mode {
            ClockMode::Recording => self.config.recording_tick(),
            ClockMode::Playback => self.config.playback_tick(),
        }
    }

    /// Whole seconds represented by `ticks` in `mode`
    pub fn ticks_to_secs(&self, ticks: u64, mode: ClockMode) -> u64 {
        let tick_ms = self.tick_interval(mode).as_millis() as u64;
        ticks.saturating_mul(tick_ms) / 1000
    }

    /// Start ticking from `start_ticks`
    ///
    /// Returns false (and changes nothing) if the clock is already armed.
    /// The first tick fires one full interval after arming.
    pub fn arm(&mut self, mode: ClockMode, start_ticks: u64) -> bool {
        if self.armed.is_some() {
            debug!("Progress clock already armed, ignoring arm({:?})", mode);
            return false;
        }

        let period = self.tick_interval(mode);
        let interval = time::interval_at(Instant::now() + period, period);

        self.elapsed_ticks = start_ticks;
        self.armed = Some(Armed { mode, interval });

        debug!(
            "Progress clock armed: {:?} every {}ms from tick {}",
            mode,
            period.as_millis(),
            start_ticks
        );
        true
    }

    /// Wait for the next tick of the armed timer
    ///
    /// Never resolves while the clock is disarmed.
    pub async fn tick(&mut self) -> ClockMode {
        match self.armed.as_mut() {
            Some(armed) => {
                armed.interval.tick().await;
                armed.mode
            }
            None => futures::future::pending().await,
        }
    }

    /// Count one tick and refresh the current-time field of the armed mode
    pub fn advance(&mut self, timeline: &mut Timeline) -> Option<ClockMode> {
        let mode = self.mode()?;
        self.elapsed_ticks += 1;

        let secs = self.ticks_to_secs(self.elapsed_ticks, mode);
        match mode {
            ClockMode::Recording => timeline.recording_current_time = secs,
            ClockMode::Playback => timeline.playing_current_time = secs,
        }

        Some(mode)
    }

    /// Stop the timer and snap the current time onto the duration
    ///
    /// Disarming an idle clock is a no-op.
    pub fn disarm(&mut self, timeline: &mut Timeline) -> Option<ClockMode> {
        let armed = self.armed.take()?;
        timeline.snap(armed.mode);
        debug!("Progress clock disarmed: {:?}", armed.mode);
        Some(armed.mode)
    }

    /// Stop the timer without snapping, returning the ticks counted so far
    pub fn suspend(&mut self) -> Option<u64> {
        let armed = self.armed.take()?;
        debug!(
            "Progress clock suspended: {:?} at tick {}",
            armed.mode, self.elapsed_ticks
        );
        Some(self.elapsed_ticks)
    }
}
