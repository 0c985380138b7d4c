//! Error types for the Android native module

use thiserror::Error;

use mwa_core::{ConfigError, ErrorKind, StructuredError};

/// Android native module errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start bridge runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The background task running an operation panicked or was cancelled
    #[error("Bridge task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for BridgeError {
    fn from(e: tokio::task::JoinError) -> Self {
        BridgeError::Task(e.to_string())
    }
}

impl From<BridgeError> for StructuredError {
    fn from(e: BridgeError) -> Self {
        StructuredError::new(ErrorKind::Generic.code(), e.to_string(), None)
    }
}

/// Serialize a boundary error for the platform side.
pub(crate) fn to_json(error: &StructuredError) -> String {
    serde_json::to_string(error).unwrap_or_else(|_| error.message.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_is_generic() {
        let structured = StructuredError::from(BridgeError::InvalidParameter("method".into()));
        assert_eq!(structured.kind(), Some(ErrorKind::Generic));
        assert_eq!(structured.message, "Invalid parameter: method");
    }

    #[test]
    fn test_to_json_uses_wire_names() {
        let error = StructuredError::new(
            "JSON_RPC_ERROR",
            "authorization declined",
            Some(serde_json::json!({ "jsonRpcErrorCode": -1 })),
        );
        let json: serde_json::Value = serde_json::from_str(&to_json(&error)).unwrap();
        assert_eq!(json["code"], "JSON_RPC_ERROR");
        assert_eq!(json["userInfo"]["jsonRpcErrorCode"], -1);
    }
}
