//! Provider configuration.
//!
//! [`ProviderConfig`] is what the plugin host hands over after decoding the
//! provider block. It carries the endpoint, TLS options and the bounds of the
//! delete convergence loop. Credentials are not part of it: bearer tokens
//! come from the [`TokenSource`](crate::client::TokenSource) the host supplies.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for one provider instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProviderConfig {
    /// Base URL of the automation appliance, e.g. `https://vra.example.com`
    #[validate(url)]
    pub host: String,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    /// Optional path to a PEM bundle trusted in addition to the system roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,

    /// Value of the `apiVersion` query parameter sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Per-request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound on how long a delete keeps retrying, in seconds
    #[validate(range(min = 1, max = 86400))]
    #[serde(default = "default_delete_timeout_secs")]
    pub delete_timeout_secs: u64,

    /// Pause between delete attempts, in seconds
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_delete_poll_interval_secs")]
    pub delete_poll_interval_secs: u64,

    /// Growth factor applied to the pause after each attempt (1 = fixed interval)
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_delete_backoff_multiplier")]
    pub delete_backoff_multiplier: u32,

    /// Cap on the pause between delete attempts, in seconds
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_delete_max_interval_secs")]
    pub delete_max_interval_secs: u64,
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_delete_timeout_secs() -> u64 {
    15 * 60
}

const fn default_delete_poll_interval_secs() -> u64 {
    5
}

const fn default_delete_backoff_multiplier() -> u32 {
    1
}

const fn default_delete_max_interval_secs() -> u64 {
    60
}

impl ProviderConfig {
    /// Create a configuration for `host` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the host is not a valid URL.
    pub fn new(host: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            host: host.into(),
            ..Self::default()
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set whether TLS verification is skipped.
    #[must_use]
    pub const fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set a custom CA bundle path.
    #[must_use]
    pub fn with_ca_file(mut self, path: PathBuf) -> Self {
        self.ca_file = Some(path);
        self
    }

    /// Set the `apiVersion` query value.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the per-request timeout in seconds.
    #[must_use]
    pub const fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set how long deletes keep retrying, in seconds.
    #[must_use]
    pub const fn with_delete_timeout(mut self, seconds: u64) -> Self {
        self.delete_timeout_secs = seconds;
        self
    }

    /// Set the pause between delete attempts, in seconds.
    #[must_use]
    pub const fn with_delete_poll_interval(mut self, seconds: u64) -> Self {
        self.delete_poll_interval_secs = seconds;
        self
    }

    /// Set the backoff multiplier for delete retries.
    #[must_use]
    pub const fn with_delete_backoff(mut self, multiplier: u32, max_interval_secs: u64) -> Self {
        self.delete_backoff_multiplier = multiplier;
        self.delete_max_interval_secs = max_interval_secs;
        self
    }

    /// Per-request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delete retry bound as a Duration.
    #[must_use]
    pub const fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_timeout_secs)
    }

    /// Parse the host into a base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be parsed.
    pub fn parse_host_url(&self) -> Result<Url, Error> {
        Url::parse(&self.host).map_err(|e| Error::ConfigError(format!("Invalid host URL: {e}")))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: "https://localhost".to_string(),
            insecure: false,
            ca_file: None,
            api_version: None,
            request_timeout_secs: default_request_timeout_secs(),
            delete_timeout_secs: default_delete_timeout_secs(),
            delete_poll_interval_secs: default_delete_poll_interval_secs(),
            delete_backoff_multiplier: default_delete_backoff_multiplier(),
            delete_max_interval_secs: default_delete_max_interval_secs(),
        }
    }
}
