use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::config::EffectsConfig;
use crate::audio::StreamFormat;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoParams {
    pub delay_ms: u32,
    /// Portion of the output fed back into the delay line
    pub feedback_percent: f32,
    /// 0 = dry only, 100 = wet only
    pub wet_dry_mix: f32,
}

impl Default for EchoParams {
    fn default() -> Self {
        Self {
            delay_ms: 250,
            feedback_percent: 50.0,
            wet_dry_mix: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReverbPreset {
    SmallRoom,
    LargeHall,
    Cathedral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    pub preset: ReverbPreset,
    pub wet_dry_mix: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            preset: ReverbPreset::Cathedral,
            wet_dry_mix: 50.0,
        }
    }
}

/// One processing node of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Source,
    /// Time/pitch shifter; passes audio through untouched when both are unset
    PitchRate {
        rate: Option<f32>,
        pitch: Option<f32>,
    },
    Echo(EchoParams),
    Reverb(ReverbParams),
    Output,
}

/// Stage identity without parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Source,
    PitchRate,
    Echo,
    Reverb,
    Output,
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Source => StageKind::Source,
            Stage::PitchRate { .. } => StageKind::PitchRate,
            Stage::Echo(_) => StageKind::Echo,
            Stage::Reverb(_) => StageKind::Reverb,
            Stage::Output => StageKind::Output,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(
            self,
            Stage::PitchRate {
                rate: None,
                pitch: None
            }
        )
    }
}

/// A link between two neighbouring stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub from: StageKind,
    pub to: StageKind,
    pub format: StreamFormat,
}

/// Resolved, linear effects pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
    format: StreamFormat,
    rate: Option<f32>,
}

impl Pipeline {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(Stage::kind).collect()
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Rate factor applied by the pitch/rate stage, if any
    pub fn rate(&self) -> Option<f32> {
        self.rate
    }

    /// Neighbouring stage pairs in signal order, all in the source format
    pub fn connections(&self) -> impl Iterator<Item = Connection> + '_ {
        self.stages.windows(2).map(move |pair| Connection {
            from: pair[0].kind(),
            to: pair[1].kind(),
            format: self.format,
        })
    }

    /// Time left until the source is fully rendered, given the render head
    pub fn estimate_remaining(&self, total: Duration, position: Duration) -> Duration {
        estimate_remaining(total, position, self.rate)
    }
}

/// Builds pipelines from effect toggles
pub struct EffectsGraph;

impl EffectsGraph {
    /// Resolve `config` into an ordered pipeline
    ///
    /// The pitch/rate stage is always present; echo precedes reverb.
    pub fn build(config: &EffectsConfig, format: StreamFormat) -> Pipeline {
        let rate = config.effective_rate();
        let pitch = config.effective_pitch();

        let mut stages = Vec::with_capacity(5);
        stages.push(Stage::Source);
        stages.push(Stage::PitchRate { rate, pitch });
        if config.echo_enabled {
            stages.push(Stage::Echo(EchoParams::default()));
        }
        if config.reverb_enabled {
            stages.push(Stage::Reverb(ReverbParams::default()));
        }
        stages.push(Stage::Output);

        let pipeline = Pipeline {
            stages,
            format,
            rate,
        };

        debug!(
            "Effects pipeline resolved: {:?} ({}Hz, {} channels)",
            pipeline.kinds(),
            format.sample_rate,
            format.channels
        );

        pipeline
    }
}

/// `(total - position) / rate`, saturating at zero
///
/// Advisory only: used to schedule the completion notification.
pub fn estimate_remaining(total: Duration, position: Duration, rate: Option<f32>) -> Duration {
    let remaining = total.saturating_sub(position);
    match rate {
        Some(rate) if rate.is_finite() && rate > 0.0 => remaining.div_f64(rate as f64),
        _ => remaining,
    }
}
