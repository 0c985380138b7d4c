//! Configuration for the bridge.
//!
//! [`BridgeConfig`] is supplied once when the native module is created, as a
//! JSON string in the same way the platform layers pass their configuration.
//! [`AssociationConfig`] travels with each `startSession` call.
//!
//! # Example JSON
//!
//! ```json
//! {
//!   "association_timeout_ms": 10000,
//!   "client_timeout_ms": 90000,
//!   "request_code": 0,
//!   "default_base_uri": null
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use mwa_transport::parse_base_uri;

/// Bound on the handshake and on closing the association
pub const DEFAULT_ASSOCIATION_TIMEOUT_MS: u64 = 10_000;
/// Client-side lifetime of an association and bound on each method call
pub const DEFAULT_CLIENT_TIMEOUT_MS: u64 = 90_000;
/// Request code used to launch the wallet
pub const DEFAULT_REQUEST_CODE: i32 = 0;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse config JSON
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Invalid base URI: {0}")]
    InvalidBaseUri(String),
}

/// Bridge-wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub association_timeout_ms: u64,
    pub client_timeout_ms: u64,
    pub request_code: i32,
    /// Base URI used when a session is started without one
    pub default_base_uri: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            association_timeout_ms: DEFAULT_ASSOCIATION_TIMEOUT_MS,
            client_timeout_ms: DEFAULT_CLIENT_TIMEOUT_MS,
            request_code: DEFAULT_REQUEST_CODE,
            default_base_uri: None,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON config. An empty string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = if json.trim().is_empty() {
            Self::default()
        } else {
            serde_json::from_str(json)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.association_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "association_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.client_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "client_timeout_ms must be greater than zero".into(),
            ));
        }
        if let Some(uri) = &self.default_base_uri {
            parse_base_uri(uri).map_err(|e| ConfigError::InvalidBaseUri(e.to_string()))?;
        }
        Ok(())
    }

    pub fn association_timeout(&self) -> Duration {
        Duration::from_millis(self.association_timeout_ms)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }

    /// Base URI for a session: the per-call override, else the configured default.
    pub fn resolve_base_uri(
        &self,
        session: Option<&AssociationConfig>,
    ) -> Result<Option<Url>, ConfigError> {
        let raw = session
            .and_then(|c| c.base_uri.as_deref())
            .or(self.default_base_uri.as_deref());

        raw.map(|uri| parse_base_uri(uri).map_err(|e| ConfigError::InvalidBaseUri(e.to_string())))
            .transpose()
    }
}

/// Per-session configuration passed to `startSession`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationConfig {
    /// Overrides the URI used to address the wallet during the handshake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,
}

impl AssociationConfig {
    pub fn with_base_uri(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: Some(base_uri.into()),
        }
    }
}
