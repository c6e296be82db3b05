//! Application identity presented to the wallet.
//!
//! The wallet shows these fields to the user when asking whether to allow the
//! application, and re-checks them on every authorization.

use serde::{Deserialize, Serialize};

/// Length of an application id, in hex characters.
const APP_ID_LEN: usize = 64;

/// Identity of the requesting application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppInfo {
    /// 64-character hex identifier, stable across runs.
    pub id: String,
    /// Human-readable application name.
    pub name: String,
    pub description: String,
    pub url: String,
}

impl AppInfo {
    /// Create a new application identity.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            url: url.into(),
        }
    }

    /// Check the fields the wallet refuses outright.
    pub fn validate(&self) -> Result<(), AppInfoError> {
        if self.id.len() != APP_ID_LEN || !self.id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppInfoError::InvalidId(self.id.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(AppInfoError::EmptyName);
        }
        Ok(())
    }
}

/// Error validating an [`AppInfo`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppInfoError {
    #[error("application id must be {APP_ID_LEN} hex characters, got: {0}")]
    InvalidId(String),
    #[error("application name cannot be empty")]
    EmptyName,
}
