//! Metering API configuration.

use console_core::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
pub struct MeteringConfig {
    /// Metering API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token. Unset means usage routes answer 500.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Time zone for window boundaries
    #[serde(default = "default_window_time_zone")]
    pub window_time_zone: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://openmeter.cloud".to_string()
}

fn default_window_time_zone() -> String {
    "UTC".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            window_time_zone: default_window_time_zone(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MeteringConfig {
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::NotConfigured("Metering API key"))
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }
}

impl std::fmt::Debug for MeteringConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteringConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("window_time_zone", &self.window_time_zone)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
