//! Configuration management for Relaycast
//!
//! Configuration is read from a TOML file resolved via the XDG Base
//! Directory spec, with every field optional. A missing file yields the
//! built-in defaults, so the binaries run with zero setup. The upstream
//! bearer token is deliberately not part of the file; it comes from the
//! environment only (see [`crate::feed::twitter::TwitterFeed::from_env`]).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// Which account to watch and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Handle of the monitored account
    #[serde(default = "default_handle")]
    pub handle: String,

    /// How many posts each fetch asks for (the dedup window)
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,

    /// Seconds between poll ticks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Override for the upstream API base URL (testing, proxies)
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Push channel endpoints and the client's retry cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Listen address for the broadcast server
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// URL the subscriber client connects to
    #[serde(default = "default_channel_url")]
    pub url: String,

    /// Seconds the client waits before reconnecting
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_handle() -> String {
    "elonmusk".to_string()
}

fn default_fetch_limit() -> u32 {
    5
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_bind_addr() -> String {
    "127.0.0.1:8765".to_string()
}

fn default_channel_url() -> String {
    "ws://localhost:8765".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            handle: default_handle(),
            fetch_limit: default_fetch_limit(),
            poll_interval_secs: default_poll_interval_secs(),
            api_base: None,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            url: default_channel_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl ChannelConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file is not an error; the built-in defaults are used.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("RELAYCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("relaycast").join("config.toml"))
}
