//! Console configuration.
//!
//! Loaded from TOML, then overridden by command-line flags:
//! - REST base URL and websocket URL
//! - Optional request timeout
//! - Websocket reconnect policy (off unless enabled)
//! - Message log capacity
//! - Resync strategy

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::connection::ReconnectConfig;
use crate::error::{ConsoleError, ConsoleResult};

/// Default REST base URL of a locally running proxy.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default websocket URL of a locally running proxy.
pub const DEFAULT_WEBSOCKET_URL: &str = "ws://localhost:8080/websocket";

/// Default number of log entries kept in memory.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// What to do when local state may have drifted from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResyncStrategy {
    /// Refetch the server snapshot and profiles, then reseed every controller.
    #[default]
    Snapshot,
    /// Stop the console with an error so a supervisor can restart it.
    Exit,
}

/// Websocket reconnect settings as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Whether to reconnect after the websocket closes.
    pub enabled: bool,
    /// Delay before the first attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on the delay between attempts, in milliseconds.
    pub max_delay_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Reconnect attempts after a close before giving up; unlimited when
    /// absent.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            max_attempts: None,
        }
    }
}

impl ReconnectSettings {
    /// The runtime reconnect policy, or `None` when reconnecting is disabled.
    #[must_use]
    pub fn to_reconnect_config(&self) -> Option<ReconnectConfig> {
        self.enabled.then(|| ReconnectConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_attempts: self.max_attempts,
        })
    }
}

/// Main console configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the proxy's REST interface.
    pub base_url: String,
    /// URL of the proxy's websocket.
    pub websocket_url: String,
    /// Per-request timeout in seconds; requests wait indefinitely when absent.
    pub request_timeout_secs: Option<u64>,
    /// Websocket reconnect policy.
    pub reconnect: ReconnectSettings,
    /// Number of log entries kept in memory.
    pub log_capacity: usize,
    /// Resync strategy.
    pub resync: ResyncStrategy,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            websocket_url: DEFAULT_WEBSOCKET_URL.to_string(),
            request_timeout_secs: None,
            reconnect: ReconnectSettings::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            resync: ResyncStrategy::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ConsoleResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConsoleError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> ConsoleResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConsoleError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Set the REST base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the websocket URL.
    #[must_use]
    pub fn with_websocket_url(mut self, url: impl Into<String>) -> Self {
        self.websocket_url = url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Set the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectSettings) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the message log capacity.
    #[must_use]
    pub const fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Set the resync strategy.
    #[must_use]
    pub const fn with_resync(mut self, strategy: ResyncStrategy) -> Self {
        self.resync = strategy;
        self
    }

    /// The request timeout, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Parsed REST base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or not http(s).
    pub fn parsed_base_url(&self) -> ConsoleResult<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConsoleError::Config(format!("invalid base_url '{}': {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConsoleError::Config(
                "base_url must start with http:// or https://".to_string(),
            ));
        }
        if url.cannot_be_a_base() {
            return Err(ConsoleError::Config(format!(
                "base_url '{}' cannot be used as a base",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> ConsoleResult<()> {
        self.parsed_base_url()?;

        if !self.websocket_url.starts_with("ws://") && !self.websocket_url.starts_with("wss://") {
            return Err(ConsoleError::Config(
                "websocket_url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(ConsoleError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.log_capacity == 0 {
            return Err(ConsoleError::Config(
                "log_capacity must be greater than 0".to_string(),
            ));
        }

        let reconnect = &self.reconnect;
        if reconnect.enabled {
            if reconnect.backoff_multiplier < 1.0 {
                return Err(ConsoleError::Config(
                    "reconnect.backoff_multiplier must be at least 1.0".to_string(),
                ));
            }
            if reconnect.initial_delay_ms > reconnect.max_delay_ms {
                return Err(ConsoleError::Config(
                    "reconnect.initial_delay_ms cannot exceed reconnect.max_delay_ms".to_string(),
                ));
            }
        }

        Ok(())
    }
}
