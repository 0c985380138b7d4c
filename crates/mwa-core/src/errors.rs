//! Error types for the bridge core.
//!
//! Session failures are raised as [`SessionError`] and converted into a
//! wire-safe [`StructuredError`] (code, message, optional detail payload)
//! before they cross the bridge boundary. The caller-facing side turns the
//! structured form back into typed errors.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use mwa_transport::TransportError;

// ============================================================================
// Wire Codes
// ============================================================================

/// No wallet able to handle the association URI is installed
pub const ERROR_WALLET_NOT_FOUND: &str = "ERROR_WALLET_NOT_FOUND";
/// The user dismissed the wallet before the handshake completed
pub const ERROR_SESSION_CANCELLED: &str = "ERROR_SESSION_CANCELLED";
pub const ERROR_SESSION_TIMEOUT: &str = "ERROR_SESSION_TIMEOUT";
pub const ERROR_SESSION_INTERRUPTED: &str = "ERROR_SESSION_INTERRUPTED";
/// The wallet's JSON-RPC layer declared an error; `userInfo.jsonRpcErrorCode` carries it
pub const JSON_RPC_ERROR: &str = "JSON_RPC_ERROR";
pub const ERROR_NO_ACTIVE_SESSION: &str = "ERROR_NO_ACTIVE_SESSION";
pub const ERROR_SESSION_FAILED: &str = "ERROR_SESSION_FAILED";

/// Detail key holding the remote JSON-RPC error code
pub const JSON_RPC_ERROR_CODE_KEY: &str = "jsonRpcErrorCode";

/// Failure taxonomy shared by both sides of the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No wallet app supporting the protocol is installed
    NotFound,
    /// User dismissed the wallet before the handshake
    Cancelled,
    /// Handshake, call or close exceeded its bound
    Timeout,
    /// The wait was interrupted by the environment
    Interrupted,
    /// The wallet returned a declared JSON-RPC error
    RemoteProtocol,
    /// Operation called without an active session (caller misuse)
    PreconditionViolation,
    /// Anything else
    Generic,
}

impl ErrorKind {
    /// Stable wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => ERROR_WALLET_NOT_FOUND,
            ErrorKind::Cancelled => ERROR_SESSION_CANCELLED,
            ErrorKind::Timeout => ERROR_SESSION_TIMEOUT,
            ErrorKind::Interrupted => ERROR_SESSION_INTERRUPTED,
            ErrorKind::RemoteProtocol => JSON_RPC_ERROR,
            ErrorKind::PreconditionViolation => ERROR_NO_ACTIVE_SESSION,
            ErrorKind::Generic => ERROR_SESSION_FAILED,
        }
    }

    /// Parse a wire code. Unknown codes return `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            ERROR_WALLET_NOT_FOUND => Some(ErrorKind::NotFound),
            ERROR_SESSION_CANCELLED => Some(ErrorKind::Cancelled),
            ERROR_SESSION_TIMEOUT => Some(ErrorKind::Timeout),
            ERROR_SESSION_INTERRUPTED => Some(ErrorKind::Interrupted),
            JSON_RPC_ERROR => Some(ErrorKind::RemoteProtocol),
            ERROR_NO_ACTIVE_SESSION => Some(ErrorKind::PreconditionViolation),
            ERROR_SESSION_FAILED => Some(ErrorKind::Generic),
            _ => None,
        }
    }

    /// Whether retrying the same operation can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Cancelled | ErrorKind::Timeout | ErrorKind::Interrupted
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Session Errors
// ============================================================================

/// Errors raised by session lifecycle and method invocation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No installed wallet handles the association URI
    #[error("Found no installed wallet that supports the mobile wallet protocol")]
    WalletNotFound(String),

    #[error("Session not established: Local association cancelled by user")]
    Cancelled,

    #[error("Timed out waiting for local association to be ready")]
    HandshakeTimeout,

    #[error("Interrupted while waiting for local association to be ready")]
    Interrupted,

    #[error("Failed establishing local association with wallet")]
    AssociationFailed(#[source] TransportError),

    #[error("Failed to start session: {0}")]
    StartFailed(String),

    /// Precondition violation: no active session
    #[error("Tried to {0} without an active session")]
    NoActiveSession(String),

    /// The wallet declared a JSON-RPC error
    #[error("{message}")]
    Remote { code: i64, message: String },

    #[error("Timed out after {timeout:?} waiting for `{method}`")]
    InvocationTimeout { method: String, timeout: Duration },

    #[error("Transport failure while invoking `{method}`: {source}")]
    InvocationTransport {
        method: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to invoke `{method}` with params {params}: {message}")]
    InvocationFailed {
        method: String,
        params: Value,
        message: String,
    },

    #[error("Timed out waiting for local association to close")]
    CloseTimeout,

    #[error("Failed to end session: {0}")]
    EndFailed(String),
}

impl SessionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::WalletNotFound(_) => ErrorKind::NotFound,
            SessionError::Cancelled => ErrorKind::Cancelled,
            SessionError::HandshakeTimeout
            | SessionError::InvocationTimeout { .. }
            | SessionError::CloseTimeout => ErrorKind::Timeout,
            SessionError::Interrupted => ErrorKind::Interrupted,
            SessionError::InvocationTransport {
                source: TransportError::Timeout,
                ..
            } => ErrorKind::Timeout,
            SessionError::InvocationTransport {
                source: TransportError::Interrupted,
                ..
            } => ErrorKind::Interrupted,
            SessionError::Remote { .. } => ErrorKind::RemoteProtocol,
            SessionError::NoActiveSession(_) => ErrorKind::PreconditionViolation,
            SessionError::AssociationFailed(_)
            | SessionError::StartFailed(_)
            | SessionError::InvocationTransport { .. }
            | SessionError::InvocationFailed { .. }
            | SessionError::EndFailed(_) => ErrorKind::Generic,
        }
    }

    /// Map to the structured form that crosses the bridge boundary.
    ///
    /// The message is the human readable description; the detail payload
    /// carries whatever a caller may want to branch on or log.
    pub fn to_structured(&self) -> StructuredError {
        let user_info = match self {
            SessionError::WalletNotFound(target) => Some(json!({ "target": target })),
            SessionError::AssociationFailed(cause) => Some(json!({ "cause": cause.to_string() })),
            SessionError::Remote { code, .. } => Some(json!({ JSON_RPC_ERROR_CODE_KEY: code })),
            SessionError::InvocationTimeout { method, timeout } => Some(json!({
                "method": method,
                "timeoutMs": u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })),
            SessionError::InvocationTransport { method, source } => Some(json!({
                "method": method,
                "cause": source.to_string(),
            })),
            SessionError::InvocationFailed { method, params, .. } => Some(json!({
                "method": method,
                "params": params,
            })),
            _ => None,
        };

        StructuredError {
            code: Some(self.kind().code().to_string()),
            message: self.to_string(),
            user_info,
        }
    }
}

// ============================================================================
// Structured Boundary Error
// ============================================================================

/// Error payload crossing the bridge boundary.
///
/// A missing `code` marks a failure the bridge did not classify; the
/// caller-facing layer passes those through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<Value>,
}

impl StructuredError {
    /// Unclassified failure with only a message
    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            user_info: None,
        }
    }

    /// Failure carrying a code and optional details
    pub fn new(code: impl Into<String>, message: impl Into<String>, user_info: Option<Value>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            user_info,
        }
    }

    /// Kind derived from the code, if the code is one the bridge emits
    pub fn kind(&self) -> Option<ErrorKind> {
        self.code.as_deref().and_then(ErrorKind::from_code)
    }

    /// Remote JSON-RPC error code from the detail payload
    pub fn json_rpc_error_code(&self) -> Option<i64> {
        self.user_info
            .as_ref()
            .and_then(|info| info.get(JSON_RPC_ERROR_CODE_KEY))
            .and_then(Value::as_i64)
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for StructuredError {}

impl From<SessionError> for StructuredError {
    fn from(e: SessionError) -> Self {
        e.to_structured()
    }
}

// ============================================================================
// Tests
// ============================================================================
