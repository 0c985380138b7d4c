//! Native module backing the bridge on Android.
//!
//! The platform calls in from its own threads: the JS bridge thread for
//! `startSession`/`invoke`/`endSession`, and the UI thread for activity
//! results. Session work runs on a dedicated runtime so the handshake and
//! close can wait without stalling either of them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use mwa_core::{
    ActivityResultData, AssociationConfig, BridgeConfig, NativeModule, SessionManager,
    StructuredError,
};
use mwa_transport::{AssociationTransport, IntentLauncher};

use crate::error::{to_json, BridgeError};

const RUNTIME_THREAD_NAME: &str = "mwa-bridge";
const RUNTIME_WORKER_THREADS: usize = 2;

/// Native module instance for Android
pub struct BridgeModule {
    manager: Arc<SessionManager>,
    handle: Handle,
    // Taken on drop so the runtime can be shut down from any context.
    runtime: Option<Runtime>,
}

impl BridgeModule {
    /// Create the module from a JSON config string.
    ///
    /// An empty string selects the default configuration.
    pub fn new(
        config_json: &str,
        transport: Arc<dyn AssociationTransport>,
        launcher: Arc<dyn IntentLauncher>,
    ) -> Result<Self, BridgeError> {
        let config = BridgeConfig::from_json(config_json)?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(RUNTIME_WORKER_THREADS)
            .thread_name(RUNTIME_THREAD_NAME)
            .enable_all()
            .build()
            .map_err(BridgeError::Runtime)?;

        info!(?config, "bridge module created");

        Ok(Self {
            manager: Arc::new(SessionManager::new(config, transport, launcher)),
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn is_session_active(&self) -> bool {
        self.manager.has_active_session()
    }

    // ========================================================================
    // Blocking JSON surface
    //
    // These block the calling thread until the operation completes and must
    // not be called from inside an async context.
    // ========================================================================

    /// `startSession`. `config_json` may be empty or `null`.
    ///
    /// Errors are serialized structured errors.
    pub fn start_session_json(&self, config_json: &str) -> Result<(), String> {
        self.handle
            .block_on(async {
                let config = parse_association_config(config_json)?;
                self.spawn_start(config).await
            })
            .map_err(|e| to_json(&e))
    }

    /// `invoke`. Returns the JSON-encoded result.
    pub fn invoke_json(&self, method: &str, params_json: &str) -> Result<String, String> {
        self.handle
            .block_on(async {
                let params = parse_params(method, params_json)?;
                let result = self.spawn_invoke(method.to_string(), params).await?;
                serde_json::to_string(&result)
                    .map_err(|e| StructuredError::from(BridgeError::Json(e)))
            })
            .map_err(|e| to_json(&e))
    }

    /// `endSession`.
    pub fn end_session_blocking(&self) -> Result<(), String> {
        self.handle
            .block_on(self.spawn_end())
            .map_err(|e| to_json(&e))
    }

    /// Entry point for `onActivityResult`.
    ///
    /// Returns whether a pending launch was waiting on `request_code`.
    pub fn handle_activity_result(
        &self,
        request_code: i32,
        result_code: i32,
        data_uri: Option<String>,
    ) -> bool {
        debug!(request_code, result_code, "activity result");
        let data = data_uri.map(|uri| ActivityResultData { uri: Some(uri) });
        self.manager.router().deliver(request_code, result_code, data)
    }

    // ========================================================================
    // Background execution
    // ========================================================================

    /// Start on the bridge runtime.
    ///
    /// If the caller stops waiting before the start completes, a session it
    /// can no longer learn about is ended again.
    async fn spawn_start(&self, config: Option<AssociationConfig>) -> Result<(), StructuredError> {
        let manager = self.manager.clone();
        let (result_tx, result_rx) = oneshot::channel();
        self.handle.spawn(async move {
            let started = manager.start_session(config).await;
            if let Err(Ok(())) = result_tx.send(started) {
                warn!("start result was not delivered, ending session");
                if let Err(e) = manager.end_session().await {
                    warn!(error = %e, "failed to end undelivered session");
                }
            }
        });

        result_rx
            .await
            .map_err(|_| StructuredError::from(BridgeError::Task("start task ended early".into())))?
            .map_err(StructuredError::from)
    }

    async fn spawn_invoke(&self, method: String, params: Value) -> Result<Value, StructuredError> {
        let manager = self.manager.clone();
        self.handle
            .spawn(async move { manager.invoke(&method, params).await })
            .await
            .map_err(|e| StructuredError::from(BridgeError::from(e)))?
            .map_err(StructuredError::from)
    }

    async fn spawn_end(&self) -> Result<(), StructuredError> {
        let manager = self.manager.clone();
        self.handle
            .spawn(async move { manager.end_session().await })
            .await
            .map_err(|e| StructuredError::from(BridgeError::from(e)))?
            .map_err(StructuredError::from)
    }
}

#[async_trait]
impl NativeModule for BridgeModule {
    async fn start_session(&self, config: Option<AssociationConfig>) -> Result<(), StructuredError> {
        self.spawn_start(config).await
    }

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, StructuredError> {
        self.spawn_invoke(method.to_string(), params).await
    }

    async fn end_session(&self) -> Result<(), StructuredError> {
        self.spawn_end().await
    }
}

impl Drop for BridgeModule {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn parse_association_config(json: &str) -> Result<Option<AssociationConfig>, StructuredError> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<Option<AssociationConfig>>(json)
        .map_err(|e| StructuredError::from(BridgeError::Json(e)))
}

fn parse_params(method: &str, json: &str) -> Result<Value, StructuredError> {
    if method.is_empty() {
        return Err(BridgeError::InvalidParameter("method must not be empty".into()).into());
    }
    if json.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(json).map_err(|e| StructuredError::from(BridgeError::Json(e)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mwa_core::harness::wait_for_closes;
    use mwa_core::RESULT_CANCELED;
    use mwa_transport::testing::{
        sample_capabilities, HandshakeBehavior, LaunchBehavior, MockAssociationTransport,
        MockLauncher,
    };
    use std::sync::Weak;
    use std::time::{Duration, Instant};

    const FAST_CONFIG: &str = r#"{"association_timeout_ms": 500, "client_timeout_ms": 500}"#;

    fn module() -> (BridgeModule, Arc<MockAssociationTransport>, Arc<MockLauncher>) {
        let transport = Arc::new(MockAssociationTransport::new());
        let launcher = Arc::new(MockLauncher::new());
        let module = BridgeModule::new(FAST_CONFIG, transport.clone(), launcher.clone()).unwrap();
        (module, transport, launcher)
    }

    fn error_code(json: &str) -> Option<String> {
        let error: StructuredError = serde_json::from_str(json).unwrap();
        error.code
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let transport = Arc::new(MockAssociationTransport::new());
        let launcher = Arc::new(MockLauncher::new());
        let result = BridgeModule::new(r#"{"client_timeout_ms": 0}"#, transport, launcher);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_json_session_round() {
        let (module, transport, launcher) = module();
        transport
            .client()
            .respond("get_capabilities", sample_capabilities());

        module
            .start_session_json(r#"{"baseUri": "https://wallet.example"}"#)
            .unwrap();
        assert!(module.is_session_active());
        let (uri, _) = launcher.launched().pop().unwrap();
        assert!(uri.starts_with("https://wallet.example/v1/associate/local?"));

        let result = module.invoke_json("get_capabilities", "{}").unwrap();
        let result: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(result["max_transactions_per_request"], 10);

        module.end_session_blocking().unwrap();
        assert!(!module.is_session_active());
    }

    #[test]
    fn test_null_and_empty_config_use_defaults() {
        let (module, _transport, launcher) = module();

        module.start_session_json("null").unwrap();
        module.end_session_blocking().unwrap();
        module.start_session_json("").unwrap();
        module.end_session_blocking().unwrap();

        for (uri, _) in launcher.launched() {
            assert!(uri.starts_with("solana-wallet:/v1/associate/local?"));
        }
    }

    #[test]
    fn test_errors_are_serialized() {
        let (module, _transport, launcher) = module();

        let err = module.invoke_json("authorize", "{}").unwrap_err();
        assert_eq!(error_code(&err).as_deref(), Some("ERROR_NO_ACTIVE_SESSION"));

        let err = module.invoke_json("authorize", "{not json").unwrap_err();
        assert_eq!(error_code(&err).as_deref(), Some("ERROR_SESSION_FAILED"));

        let err = module.end_session_blocking().unwrap_err();
        assert_eq!(error_code(&err).as_deref(), Some("ERROR_NO_ACTIVE_SESSION"));

        launcher.set_behavior(LaunchBehavior::TargetNotFound);
        let err = module.start_session_json("").unwrap_err();
        assert_eq!(error_code(&err).as_deref(), Some("ERROR_WALLET_NOT_FOUND"));
        assert!(!module.is_session_active());
    }

    #[test]
    fn test_activity_result_cancels_start() {
        let transport = Arc::new(MockAssociationTransport::new());
        transport.set_handshake(HandshakeBehavior::Hang);
        let launcher = Arc::new(MockLauncher::new());
        let module = Arc::new(
            BridgeModule::new(FAST_CONFIG, transport.clone(), launcher.clone()).unwrap(),
        );

        let weak: Weak<BridgeModule> = Arc::downgrade(&module);
        launcher.on_launch(move |code| {
            let weak = weak.clone();
            // Results arrive on the platform's UI thread.
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                if let Some(module) = weak.upgrade() {
                    assert!(module.handle_activity_result(code, RESULT_CANCELED, None));
                }
            });
        });

        let started = Instant::now();
        let err = module.start_session_json("").unwrap_err();
        assert_eq!(error_code(&err).as_deref(), Some("ERROR_SESSION_CANCELLED"));
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(!module.is_session_active());
        assert!(module.handle.block_on(wait_for_closes(&transport, 1)));

        // No launch is pending any more.
        assert!(!module.handle_activity_result(0, RESULT_CANCELED, None));
    }

    #[tokio::test]
    async fn test_native_module_from_async_caller() {
        let (module, transport, _launcher) = module();
        transport
            .client()
            .respond("get_capabilities", sample_capabilities());
        let module: Arc<dyn NativeModule> = Arc::new(module);

        module.start_session(None).await.unwrap();
        let caps = module
            .invoke("get_capabilities", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(caps["max_messages_per_request"], 10);

        // A second start queues behind the active session.
        let queued = tokio::time::timeout(Duration::from_millis(30), module.start_session(None));
        assert!(queued.await.is_err());

        module.end_session().await.unwrap();

        // The abandoned queued start runs once the slot frees up and is
        // ended by the bridge.
        assert!(wait_for_closes(&transport, 2).await);
    }

    #[tokio::test]
    async fn test_abandoned_start_is_ended() {
        let (module, transport, _launcher) = module();
        transport.set_handshake(HandshakeBehavior::Delay(Duration::from_millis(40)));
        let manager = module.manager().clone();
        let module: Arc<dyn NativeModule> = Arc::new(module);

        let attempt = tokio::time::timeout(Duration::from_millis(10), module.start_session(None));
        assert!(attempt.await.is_err());

        assert!(wait_for_closes(&transport, 1).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!manager.has_active_session());
        assert_eq!(transport.opened_count(), 1);

        // The bridge is usable again.
        transport.set_handshake(HandshakeBehavior::Succeed);
        module.start_session(None).await.unwrap();
        module.end_session().await.unwrap();
    }
}
