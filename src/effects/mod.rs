//! Effects pipeline assembly
//!
//! Turns an `EffectsConfig` into an ordered, linear chain of processing
//! stages (source → pitch/rate → [echo] → [reverb] → output) and estimates
//! when a scheduled source will finish rendering.

mod config;
mod graph;

pub use config::{EffectsConfig, MAX_PITCH_CENTS, MAX_RATE, MIN_PITCH_CENTS, MIN_RATE};
pub use graph::{
    estimate_remaining, Connection, EchoParams, EffectsGraph, Pipeline, ReverbParams,
    ReverbPreset, Stage, StageKind,
};
