use anyhow::{Context, Result};
use serde::Deserialize;

use crate::session::SessionConfig;

/// Application configuration
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
}

impl Config {
    /// Layer `path` (any format the `config` crate reads, extension optional)
    /// and `VOICE_SESSION__*` environment variables over the defaults
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICE_SESSION").separator("__"))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
