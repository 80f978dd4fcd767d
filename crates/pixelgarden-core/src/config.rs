//! Client configuration.

use crate::color::Color;
use crate::pixels::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::viewport::DEFAULT_SCALE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default interval between full-image polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Default server the client talks to.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3030";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid scale bounds: min {min}, default {default}, max {max}")]
    ScaleBounds { min: u32, default: u32, max: u32 },
    #[error("Invalid server URL: {0}")]
    ServerUrl(String),
}

/// Canvas engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_scale: u32,
    pub min_scale: u32,
    pub max_scale: u32,
    /// Scale change per wheel notch.
    pub scale_step: u32,
    /// Grid size used until the first snapshot arrives.
    pub grid_width: u32,
    pub grid_height: u32,
    /// Initial fill and eraser color.
    pub background: Color,
    /// Initial draw color.
    pub brush_color: Color,
    /// Initial brush diameter in cells.
    pub brush_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_scale: DEFAULT_SCALE,
            min_scale: 5,
            max_scale: 100,
            scale_step: 5,
            grid_width: DEFAULT_WIDTH,
            grid_height: DEFAULT_HEIGHT,
            background: Color::BLACK,
            brush_color: Color::WHITE,
            brush_size: 1,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let ok = self.min_scale > 0
            && self.min_scale <= self.default_scale
            && self.default_scale <= self.max_scale;
        if !ok {
            return Err(ConfigError::ScaleBounds {
                min: self.min_scale,
                default: self.default_scale,
                max: self.max_scale,
            });
        }
        Ok(())
    }
}

/// Sync settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the canvas server.
    pub server_url: String,
    /// Seconds between full-image polls.
    pub poll_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Parse and check the server URL.
    pub fn parsed_url(&self) -> Result<url::Url, ConfigError> {
        let parsed = url::Url::parse(&self.server_url)
            .map_err(|e| ConfigError::ServerUrl(format!("{}: {}", self.server_url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::ServerUrl(format!(
                "unsupported scheme {}",
                parsed.scheme()
            )));
        }
        Ok(parsed)
    }
}

/// Full client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub engine: EngineConfig,
    pub sync: SyncConfig,
}

impl ClientConfig {
    /// Load from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.engine.validate()?;
        config.sync.parsed_url()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
