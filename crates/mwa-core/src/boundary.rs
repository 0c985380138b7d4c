//! The native module surface the caller-facing layer talks to.
//!
//! Every failure crossing this boundary is a [`StructuredError`]; the
//! caller-facing layer translates it back into typed errors.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::AssociationConfig;
use crate::errors::StructuredError;
use crate::session::SessionManager;

/// Bridge boundary: `startSession`, `invoke`, `endSession`.
#[async_trait]
pub trait NativeModule: Send + Sync {
    async fn start_session(&self, config: Option<AssociationConfig>) -> Result<(), StructuredError>;

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, StructuredError>;

    async fn end_session(&self) -> Result<(), StructuredError>;
}

#[async_trait]
impl NativeModule for SessionManager {
    async fn start_session(&self, config: Option<AssociationConfig>) -> Result<(), StructuredError> {
        SessionManager::start_session(self, config)
            .await
            .map_err(StructuredError::from)
    }

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, StructuredError> {
        SessionManager::invoke(self, method, params)
            .await
            .map_err(StructuredError::from)
    }

    async fn end_session(&self) -> Result<(), StructuredError> {
        SessionManager::end_session(self)
            .await
            .map_err(StructuredError::from)
    }
}

/// Module for environments without a native wallet bridge.
///
/// Every call is logged and succeeds; `invoke` yields `null`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopModule;

#[async_trait]
impl NativeModule for NoopModule {
    async fn start_session(&self, config: Option<AssociationConfig>) -> Result<(), StructuredError> {
        info!(?config, "startSession on a platform without a wallet bridge");
        Ok(())
    }

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, StructuredError> {
        info!(method, %params, "invoke on a platform without a wallet bridge");
        Ok(Value::Null)
    }

    async fn end_session(&self) -> Result<(), StructuredError> {
        info!("endSession on a platform without a wallet bridge");
        Ok(())
    }
}
