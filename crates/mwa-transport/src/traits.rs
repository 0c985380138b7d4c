//! Transport traits for the local association handshake and the protocol client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::intent::AssociationIntent;

/// JSON-RPC client bound to an established local association.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Send a method call and wait for its decoded result.
    ///
    /// `timeout` is the client-side bound the wallet is given to answer.
    async fn method_call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

/// A single local association with a wallet application.
///
/// The association is opened before the wallet is launched (so that the
/// port and session token can be embedded in the launch URI) and becomes
/// usable once `start` resolves.
#[async_trait]
pub trait LocalAssociation: Send + Sync {
    /// Loopback port the wallet should connect to
    fn port(&self) -> u16;

    /// Encoded association token identifying this session
    fn session_token(&self) -> &str;

    /// Wait for the wallet to connect and the handshake to finish
    async fn start(&self) -> Result<Arc<dyn ProtocolClient>, TransportError>;

    /// Close the association
    async fn close(&self) -> Result<(), TransportError>;
}

/// Factory for local associations.
pub trait AssociationTransport: Send + Sync {
    /// Open a new association whose client side gives up after `client_timeout`.
    fn open(&self, client_timeout: Duration) -> Result<Arc<dyn LocalAssociation>, TransportError>;
}

/// Platform hook that launches an external application for a result.
pub trait IntentLauncher: Send + Sync {
    /// Launch the wallet for `intent`; the outcome is reported later through
    /// the activity result router under `request_code`.
    fn launch(&self, intent: &AssociationIntent, request_code: i32) -> Result<(), LaunchError>;
}

/// Common transport error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Operation timed out")]
    Timeout,

    #[error("Interrupted while waiting")]
    Interrupted,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The wallet's JSON-RPC layer answered with a declared error
    #[error("Remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Association closed")]
    Closed,

    #[error("Other error: {0}")]
    Other(String),
}

/// Errors raised while launching the wallet application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    /// No installed application can handle the association URI
    #[error("No activity found to handle {0}")]
    TargetNotFound(String),

    #[error("Could not find a current activity from which to launch a local association")]
    NoForegroundActivity,
}
