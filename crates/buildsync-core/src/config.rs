//! Client configuration model.

use serde::{Deserialize, Serialize};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendSettings {
    /// Base URL of the hosted backend, e.g. `https://abc.example.co`
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key sent with every request
    #[serde(default)]
    pub anon_key: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl BackendSettings {
    /// True once both the URL and the key are set.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Root of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BuildsyncConfig {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub log: LogSettings,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
