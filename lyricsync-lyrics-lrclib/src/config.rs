//! LRCLIB provider configuration.

use const_format::concatcp;
use lyricsync_core::{CoreError, ProvidersConfig};
use serde::{Deserialize, Serialize};

/// Provider name used in config file
pub const PROVIDER_NAME: &str = "lrclib";

/// Public LRCLIB API
pub const DEFAULT_BASE_URL: &str = "https://lrclib.net/api";

/// Default timeout for HTTP requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of retry attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// LRCLIB-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LrclibConfig {
    /// API root, without a trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for transient failures, with exponential backoff
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for LrclibConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl LrclibConfig {
    /// Extract LRCLIB config from the dynamic providers config.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be parsed.
    pub fn from_providers(providers: &ProvidersConfig) -> Result<Option<Self>, CoreError> {
        providers.get(PROVIDER_NAME)
    }

    /// Validate field values.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or timeout is unusable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "providers.lrclib.base_url must be an http(s) URL, got {:?}",
                    self.base_url
                ),
            });
        }
        if self.timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "providers.lrclib.timeout_secs must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Config template for LRCLIB provider.
/// This is appended to the base config template when creating a new config file.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    "[providers.lrclib]\n",
    "# Synced lyrics from https://lrclib.net\n",
    "base_url = \"",
    DEFAULT_BASE_URL,
    "\"\n",
    "timeout_secs = ",
    DEFAULT_TIMEOUT_SECS,
    "\n",
    "max_retries = ",
    DEFAULT_MAX_RETRIES,
    "\n"
);
