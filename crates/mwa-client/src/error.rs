//! Caller-facing errors and translation of boundary failures.

use serde_json::Value;
use thiserror::Error;

use mwa_core::errors::{ERROR_WALLET_NOT_FOUND, JSON_RPC_ERROR};
use mwa_core::{ErrorKind, StructuredError};

use crate::transaction::CodecError;

/// Errors observed by code running inside [`transact`](crate::transact).
#[derive(Debug, Error)]
pub enum MobileWalletError {
    /// The wallet's protocol layer declared an error
    #[error("{message}")]
    Protocol { code: i64, message: String },

    /// A classified bridge failure
    #[error("{message}")]
    Adapter {
        code: String,
        message: String,
        data: Option<Value>,
    },

    /// A payload could not be encoded for, or decoded from, the wire
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Any other failure, passed through unchanged
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MobileWalletError {
    /// Taxonomy kind, when the error came from the bridge with a known code.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            MobileWalletError::Protocol { .. } => Some(ErrorKind::RemoteProtocol),
            MobileWalletError::Adapter { code, .. } => ErrorKind::from_code(code),
            MobileWalletError::Codec(_) | MobileWalletError::Other(_) => None,
        }
    }

    /// Wire code of an adapter error
    pub fn code(&self) -> Option<&str> {
        match self {
            MobileWalletError::Protocol { .. } => Some(JSON_RPC_ERROR),
            MobileWalletError::Adapter { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<StructuredError> for MobileWalletError {
    fn from(e: StructuredError) -> Self {
        translate(e)
    }
}

/// Turn a failure raised at the bridge boundary into a typed error.
///
/// Failures without a code pass through untouched as [`MobileWalletError::Other`].
pub fn translate(error: StructuredError) -> MobileWalletError {
    let code = match error.code.as_deref() {
        None => return MobileWalletError::Other(anyhow::Error::new(error)),
        Some(code) => code,
    };

    if code == JSON_RPC_ERROR {
        // A missing code detail maps to 0, the value an absent number decodes to.
        return MobileWalletError::Protocol {
            code: error.json_rpc_error_code().unwrap_or_default(),
            message: error.message,
        };
    }

    MobileWalletError::Adapter {
        code: code.to_string(),
        message: friendly_message(code)
            .map(str::to_string)
            .unwrap_or(error.message),
        data: error.user_info,
    }
}

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        ERROR_WALLET_NOT_FOUND => {
            Some("Found no installed wallet that supports the mobile wallet protocol.")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uncoded_passes_through() {
        let err = translate(StructuredError::uncoded("socket closed"));
        match &err {
            MobileWalletError::Other(inner) => {
                let original = inner.downcast_ref::<StructuredError>().unwrap();
                assert_eq!(original.message, "socket closed");
            }
            other => panic!("unexpected translation: {other:?}"),
        }
        assert_eq!(err.kind(), None);
        assert_eq!(err.to_string(), "socket closed");
    }

    #[test]
    fn test_json_rpc_error() {
        let err = translate(StructuredError::new(
            JSON_RPC_ERROR,
            "authorization request declined",
            Some(json!({ "jsonRpcErrorCode": -1 })),
        ));
        assert!(matches!(
            err,
            MobileWalletError::Protocol { code: -1, ref message } if message == "authorization request declined"
        ));
        assert_eq!(err.kind(), Some(ErrorKind::RemoteProtocol));
    }

    #[test]
    fn test_wallet_not_found_gets_friendly_message() {
        let err = translate(StructuredError::new(
            ERROR_WALLET_NOT_FOUND,
            "No activity found to handle intent",
            None,
        ));
        assert_eq!(
            err.to_string(),
            "Found no installed wallet that supports the mobile wallet protocol."
        );
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
        assert_eq!(err.code(), Some(ERROR_WALLET_NOT_FOUND));
    }

    #[test]
    fn test_other_codes_keep_message_and_details() {
        let details = json!({ "method": "sign_messages", "params": {} });
        let err = translate(StructuredError::new(
            "ERROR_SESSION_FAILED",
            "Failed to invoke sign_messages",
            Some(details.clone()),
        ));
        match err {
            MobileWalletError::Adapter { code, message, data } => {
                assert_eq!(code, "ERROR_SESSION_FAILED");
                assert_eq!(message, "Failed to invoke sign_messages");
                assert_eq!(data, Some(details));
            }
            other => panic!("unexpected translation: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_code_is_adapter_without_kind() {
        let err = translate(StructuredError::new("ERROR_SOMETHING_NEW", "new failure", None));
        assert!(matches!(err, MobileWalletError::Adapter { .. }));
        assert_eq!(err.kind(), None);
        assert_eq!(err.code(), Some("ERROR_SOMETHING_NEW"));
    }
}
