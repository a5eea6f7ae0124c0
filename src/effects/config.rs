use serde::{Deserialize, Serialize};

pub const MIN_RATE: f32 = 1.0 / 32.0;
pub const MAX_RATE: f32 = 32.0;
pub const MIN_PITCH_CENTS: f32 = -2400.0;
pub const MAX_PITCH_CENTS: f32 = 2400.0;

/// Feature toggles for one playback-with-effects invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Playback rate multiplier (1.0 = unchanged)
    pub rate: Option<f32>,
    /// Pitch shift in cents
    pub pitch: Option<f32>,
    pub echo_enabled: bool,
    pub reverb_enabled: bool,
}

impl EffectsConfig {
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_pitch(mut self, cents: f32) -> Self {
        self.pitch = Some(cents);
        self
    }

    pub fn with_echo(mut self, enabled: bool) -> Self {
        self.echo_enabled = enabled;
        self
    }

    pub fn with_reverb(mut self, enabled: bool) -> Self {
        self.reverb_enabled = enabled;
        self
    }

    /// Rate clamped to the supported range; non-finite values are ignored
    pub fn effective_rate(&self) -> Option<f32> {
        self.rate
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(MIN_RATE, MAX_RATE))
    }

    /// Pitch clamped to ±2 octaves; non-finite values are ignored
    pub fn effective_pitch(&self) -> Option<f32> {
        self.pitch
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(MIN_PITCH_CENTS, MAX_PITCH_CENTS))
    }
}
