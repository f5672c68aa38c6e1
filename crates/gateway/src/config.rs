//! Gateway configuration.

use console_core::{Error, Result, CONSUMER_PAGE_SIZE};
use serde::{Deserialize, Serialize};

/// Upstream gateway configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Resource API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token. Unset means every consumer route answers 500.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Account identifier
    #[serde(default = "default_account")]
    pub account: String,
    /// Key bucket identifier
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Page size for listing consumers
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://dev.zuplo.com/v1".to_string()
}

fn default_account() -> String {
    "bronze_environmental_wren".to_string()
}

fn default_bucket() -> String {
    "zprj-3eldpquvji1nnfahppzlbnwi-working-copy".to_string()
}

fn default_page_size() -> u32 {
    CONSUMER_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            account: default_account(),
            bucket: default_bucket(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// The bearer token, or `NotConfigured` when absent or blank.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::NotConfigured("API key"))
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("account", &self.account)
            .field("bucket", &self.bucket)
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
