//! Configuration module
//!
//! Handles loading and saving calc-client configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::network::{SessionConfig, DEFAULT_DATAGRAM_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE};
use crate::protocol::{Encoding, ASSIGNMENT_RECORD_SIZE};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Tracing filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_filter: default_log_filter(),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Receive timeout on UDP in ms
    #[serde(default = "default_datagram_timeout")]
    pub datagram_timeout_ms: u64,
    /// TCP connect timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Largest message accepted per receive
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_datagram_timeout() -> u64 {
    DEFAULT_DATAGRAM_TIMEOUT.as_millis() as u64
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            datagram_timeout_ms: default_datagram_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl NetworkConfig {
    /// Reject settings no session could work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_message_size < ASSIGNMENT_RECORD_SIZE {
            return Err(ConfigError::Invalid {
                field: "network.max_message_size",
                reason: format!(
                    "{} is smaller than an assignment record ({} bytes)",
                    self.max_message_size, ASSIGNMENT_RECORD_SIZE
                ),
            });
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Session settings for one negotiation in `encoding`
    pub fn session_config(&self, encoding: Encoding) -> SessionConfig {
        SessionConfig::new(encoding)
            .with_datagram_timeout(Duration::from_millis(self.datagram_timeout_ms))
            .with_max_message_size(self.max_message_size)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.network.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("calc-client/config.toml")),
            Some(PathBuf::from("./calc-client.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            verbose: false,
            log_filter: "calc_client=debug".to_string(),
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}
