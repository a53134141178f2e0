//! Configuration management.

use anyhow::{Context, Result};
use ezsign_panel_hw::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// CLI configuration, loaded from an optional TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Product identifier (2.9-2c, 2.9-4c, 4.2-2c, 4.2-4c)
    #[serde(default = "default_product")]
    pub product: String,

    /// PC/SC reader name (default: first reader)
    #[serde(default)]
    pub reader: Option<String>,

    /// PC/SC reader index (zero-based)
    #[serde(default)]
    pub reader_index: Option<isize>,

    /// Error-diffusion dithering in image mode
    #[serde(default)]
    pub dither: bool,

    /// Image payload bytes per APDU (1-250)
    #[serde(default = "default_max_fragment")]
    pub max_fragment: usize,

    /// Refresh poll interval in milliseconds
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,

    /// Maximum refresh polls
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
}

// Default value functions
fn default_product() -> String {
    "4.2-4c".to_string()
}

fn default_max_fragment() -> usize {
    250
}

fn default_poll_ms() -> u64 {
    500
}

fn default_poll_attempts() -> u32 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            product: default_product(),
            reader: None,
            reader_index: None,
            dither: false,
            max_fragment: default_max_fragment(),
            poll_ms: default_poll_ms(),
            poll_attempts: default_poll_attempts(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Session settings for the device.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            max_fragment: self.max_fragment,
            poll_interval: Duration::from_millis(self.poll_ms),
            max_poll_attempts: self.poll_attempts,
        }
    }
}
