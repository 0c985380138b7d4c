//! Testing utilities for code driving a local association.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::intent::{AssociationIntent, LOCAL_PORT_RANGE};
use crate::traits::{
    AssociationTransport, IntentLauncher, LaunchError, LocalAssociation, ProtocolClient,
    TransportError,
};

/// JSON-RPC code returned for methods the mock has no response for
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Scripted protocol client
pub struct MockProtocolClient {
    calls: Mutex<Vec<(String, Value)>>,
    responses: Mutex<HashMap<String, Result<Value, TransportError>>>,
    latency: Duration,
}

impl MockProtocolClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
        }
    }

    /// Configure simulated latency per call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer `method` with `result`
    pub fn respond(&self, method: &str, result: Value) {
        self.responses.lock().insert(method.to_string(), Ok(result));
    }

    /// Fail `method` with `error`
    pub fn fail(&self, method: &str, error: TransportError) {
        self.responses.lock().insert(method.to_string(), Err(error));
    }

    /// Get recorded calls
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

impl Default for MockProtocolClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolClient for MockProtocolClient {
    async fn method_call(
        &self,
        method: &str,
        params: Value,
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.calls.lock().push((method.to_string(), params));

        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        let scripted = self.responses.lock().get(method).cloned();
        scripted.unwrap_or_else(|| {
            Err(TransportError::Remote {
                code: METHOD_NOT_FOUND,
                message: format!("method `{method}` not found"),
            })
        })
    }
}

/// How a mock association behaves when started
#[derive(Clone, Debug)]
pub enum HandshakeBehavior {
    /// Connect immediately
    Succeed,
    /// Connect after a delay
    Delay(Duration),
    /// Fail with the given error
    Fail(TransportError),
    /// Never connect
    Hang,
}

/// How a mock association behaves when closed
#[derive(Clone, Debug)]
pub enum CloseBehavior {
    Succeed,
    Fail(TransportError),
    Hang,
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    started: AtomicUsize,
    closed: AtomicUsize,
    in_handshake: AtomicUsize,
    peak_handshakes: AtomicUsize,
}

/// Decrements the in-flight handshake gauge even when the start future is dropped.
struct HandshakeGauge<'a>(&'a Counters);

impl<'a> HandshakeGauge<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.in_handshake.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_handshakes.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for HandshakeGauge<'_> {
    fn drop(&mut self) {
        self.0.in_handshake.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Association handed out by [`MockAssociationTransport`]
pub struct MockAssociation {
    port: u16,
    token: String,
    client: Arc<MockProtocolClient>,
    handshake: HandshakeBehavior,
    close: CloseBehavior,
    counters: Arc<Counters>,
}

#[async_trait]
impl LocalAssociation for MockAssociation {
    fn port(&self) -> u16 {
        self.port
    }

    fn session_token(&self) -> &str {
        &self.token
    }

    async fn start(&self) -> Result<Arc<dyn ProtocolClient>, TransportError> {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        let _gauge = HandshakeGauge::enter(&self.counters);

        match &self.handshake {
            HandshakeBehavior::Succeed => {}
            HandshakeBehavior::Delay(delay) => sleep(*delay).await,
            HandshakeBehavior::Fail(e) => return Err(e.clone()),
            HandshakeBehavior::Hang => std::future::pending::<()>().await,
        }

        Ok(self.client.clone() as Arc<dyn ProtocolClient>)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        match &self.close {
            CloseBehavior::Succeed => Ok(()),
            CloseBehavior::Fail(e) => Err(e.clone()),
            CloseBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// Mock association transport for testing
pub struct MockAssociationTransport {
    client: Arc<MockProtocolClient>,
    handshake: Mutex<HandshakeBehavior>,
    close: Mutex<CloseBehavior>,
    open_error: Mutex<Option<TransportError>>,
    counters: Arc<Counters>,
}

impl MockAssociationTransport {
    /// Create a transport whose associations connect immediately
    pub fn new() -> Self {
        Self::with_client(Arc::new(MockProtocolClient::new()))
    }

    /// Create a transport handing out `client` on every handshake
    pub fn with_client(client: Arc<MockProtocolClient>) -> Self {
        Self {
            client,
            handshake: Mutex::new(HandshakeBehavior::Succeed),
            close: Mutex::new(CloseBehavior::Succeed),
            open_error: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Configure how subsequently opened associations start
    pub fn set_handshake(&self, behavior: HandshakeBehavior) {
        *self.handshake.lock() = behavior;
    }

    /// Configure how subsequently opened associations close
    pub fn set_close(&self, behavior: CloseBehavior) {
        *self.close.lock() = behavior;
    }

    /// Make the next `open` calls fail
    pub fn fail_open(&self, error: TransportError) {
        *self.open_error.lock() = Some(error);
    }

    /// Protocol client shared by all associations
    pub fn client(&self) -> &Arc<MockProtocolClient> {
        &self.client
    }

    pub fn opened_count(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn started_count(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Largest number of handshakes that were ever in flight at once
    pub fn peak_concurrent_handshakes(&self) -> usize {
        self.counters.peak_handshakes.load(Ordering::SeqCst)
    }
}

impl Default for MockAssociationTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AssociationTransport for MockAssociationTransport {
    fn open(&self, _client_timeout: Duration) -> Result<Arc<dyn LocalAssociation>, TransportError> {
        if let Some(e) = self.open_error.lock().clone() {
            return Err(e);
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);

        let mut rng = rand::thread_rng();
        let port = rng.gen_range(LOCAL_PORT_RANGE);
        let token: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        Ok(Arc::new(MockAssociation {
            port,
            token,
            client: self.client.clone(),
            handshake: self.handshake.lock().clone(),
            close: self.close.lock().clone(),
            counters: self.counters.clone(),
        }))
    }
}

/// How [`MockLauncher`] reacts to a launch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchBehavior {
    Succeed,
    TargetNotFound,
    NoForegroundActivity,
}

type LaunchHook = Box<dyn Fn(i32) + Send + Sync>;

/// Launcher recording every launched URI
pub struct MockLauncher {
    behavior: Mutex<LaunchBehavior>,
    launched: Mutex<Vec<(String, i32)>>,
    on_launch: Mutex<Option<LaunchHook>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(LaunchBehavior::Succeed),
            launched: Mutex::new(Vec::new()),
            on_launch: Mutex::new(None),
        }
    }

    pub fn set_behavior(&self, behavior: LaunchBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Run `hook` with the request code after every successful launch
    pub fn on_launch(&self, hook: impl Fn(i32) + Send + Sync + 'static) {
        *self.on_launch.lock() = Some(Box::new(hook));
    }

    /// Get launched URIs with their request codes
    pub fn launched(&self) -> Vec<(String, i32)> {
        self.launched.lock().clone()
    }
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentLauncher for MockLauncher {
    fn launch(&self, intent: &AssociationIntent, request_code: i32) -> Result<(), LaunchError> {
        match *self.behavior.lock() {
            LaunchBehavior::Succeed => {}
            LaunchBehavior::TargetNotFound => {
                return Err(LaunchError::TargetNotFound(intent.to_string()))
            }
            LaunchBehavior::NoForegroundActivity => return Err(LaunchError::NoForegroundActivity),
        }

        self.launched.lock().push((intent.to_string(), request_code));
        if let Some(hook) = self.on_launch.lock().as_ref() {
            hook(request_code);
        }
        Ok(())
    }
}

/// Canned `get_capabilities` response
pub fn sample_capabilities() -> Value {
    json!({
        "max_transactions_per_request": 10,
        "max_messages_per_request": 10,
        "supported_transaction_versions": ["legacy", 0],
        "features": ["solana:signTransactions"],
    })
}
