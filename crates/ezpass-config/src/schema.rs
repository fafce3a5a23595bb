//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub fill: FillConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection to the local credential service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Upper bound for reaching `Open` when an operation triggers a connect.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Upper bound for the answer to a fetch.
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout_ms: default_connect_timeout(),
            response_timeout_ms: default_response_timeout(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:9001".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_response_timeout() -> u64 {
    10000
}

/// Which reconnection policy a deployment uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectPolicyKind {
    /// Reconnect only when the next operation needs the channel.
    #[default]
    Lazy,
    /// Retry eagerly up to `max_attempts`, then fail fast.
    Bounded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub policy: ReconnectPolicyKind,

    /// Ceiling for the bounded policy.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between bounded attempts.
    #[serde(default = "default_reconnect_delay")]
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicyKind::default(),
            max_attempts: default_max_attempts(),
            delay_ms: default_reconnect_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_reconnect_delay() -> u64 {
    2000
}

/// Local persistence of field mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    ezpass_dir().join("storage.json")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillConfig {
    /// Extra placeholder literals that must never be written into a field.
    #[serde(default)]
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    ezpass_dir().join("logs")
}

/// `~/.ezpass`, or `.ezpass` when no home directory is known.
pub fn ezpass_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".ezpass"))
        .unwrap_or_else(|| PathBuf::from(".ezpass"))
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    ezpass_dir().join("config.toml")
}
