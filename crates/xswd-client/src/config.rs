//! Connection settings.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConnectionError, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 44326;
pub const DEFAULT_PATH: &str = "/xswd";

/// Where to find the wallet and how long to wait on it.
///
/// Can be loaded from TOML; every field is optional:
///
/// ```toml
/// host = "127.0.0.1"
/// port = 44326
/// request_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Sub-protocol path appended to the endpoint.
    pub path: String,
    pub auth_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub event_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            auth_timeout_ms: 30_000,
            request_timeout_ms: 20_000,
            event_timeout_ms: 20_000,
        }
    }
}

impl ConnectionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ConnectionError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConnectionError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Override all three wait budgets.
    pub fn with_timeouts(mut self, auth: Duration, request: Duration, event: Duration) -> Self {
        self.auth_timeout_ms = millis(auth);
        self.request_timeout_ms = millis(request);
        self.event_timeout_ms = millis(event);
        self
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.path)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }
}

/// Saturates instead of truncating durations past `u64::MAX` milliseconds.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
