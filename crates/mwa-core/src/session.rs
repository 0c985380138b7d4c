//! Session lifecycle for the mobile wallet adapter bridge.
//!
//! A [`SessionManager`] owns the single session slot of the process. Start
//! and end transitions are serialized by the session lock; while the lock is
//! held a scoped guard guarantees that a failed transition leaves no session
//! behind and that the lock is released on every exit path, including when
//! the awaiting future is dropped.
//!
//! An established session also holds the session permit until it is ended,
//! so a second start queues behind the active session instead of failing.
//!
//! Starting a session:
//! 1. Wait for the session permit, then acquire the session lock
//! 2. Open a local association and derive the launch URI from it
//! 3. Register a one-shot activity result so a user cancellation fails fast
//! 4. Launch the wallet
//! 5. Wait (bounded) for the handshake to produce a protocol client
//!
//! A start that fails after the association was opened closes it again. A
//! user cancellation returns at once and closes it in the background.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex, MutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use url::Url;

use mwa_transport::{
    AssociationIntent, AssociationTransport, IntentLauncher, LaunchError, LocalAssociation,
    ProtocolClient, TransportError,
};

use crate::config::{AssociationConfig, BridgeConfig};
use crate::errors::SessionError;
use crate::gateway::MethodGateway;
use crate::router::{ActivityResultRouter, RESULT_CANCELED};

/// The live association with a wallet.
struct ActiveSession {
    client: Arc<dyn ProtocolClient>,
    association: Arc<dyn LocalAssociation>,
    // Released when the session leaves the slot.
    _permit: OwnedSemaphorePermit,
}

type SessionSlot = RwLock<Option<ActiveSession>>;

/// Holds the session lock for one lifecycle transition.
///
/// Dropping the guard without committing clears the session slot and the
/// pending activity result before the lock itself is released.
struct TransitionGuard<'a> {
    _lock: MutexGuard<'a, ()>,
    slot: &'a SessionSlot,
    router: &'a ActivityResultRouter,
    request_code: i32,
    armed: bool,
}

impl<'a> TransitionGuard<'a> {
    fn new(
        lock: MutexGuard<'a, ()>,
        slot: &'a SessionSlot,
        router: &'a ActivityResultRouter,
        request_code: i32,
    ) -> Self {
        Self {
            _lock: lock,
            slot,
            router,
            request_code,
            armed: true,
        }
    }

    /// Store the established session and keep it after the guard drops.
    fn commit(mut self, session: ActiveSession) {
        *self.slot.write() = Some(session);
        self.armed = false;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.router.cancel(self.request_code);
        if self.armed {
            self.slot.write().take();
        }
    }
}

/// Coordinator of the process-wide wallet session.
pub struct SessionManager {
    config: BridgeConfig,
    transport: Arc<dyn AssociationTransport>,
    launcher: Arc<dyn IntentLauncher>,
    router: Arc<ActivityResultRouter>,
    gateway: MethodGateway,
    lock: Mutex<()>,
    permits: Arc<Semaphore>,
    slot: SessionSlot,
}

impl SessionManager {
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn AssociationTransport>,
        launcher: Arc<dyn IntentLauncher>,
    ) -> Self {
        let gateway = MethodGateway::new(config.client_timeout());
        Self {
            config,
            transport,
            launcher,
            router: Arc::new(ActivityResultRouter::new()),
            gateway,
            lock: Mutex::new(()),
            permits: Arc::new(Semaphore::new(1)),
            slot: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Router the platform feeds activity results into
    pub fn router(&self) -> &Arc<ActivityResultRouter> {
        &self.router
    }

    pub fn has_active_session(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Whether a start or end transition currently holds the session lock
    pub fn is_locked(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Establish a session with a wallet.
    ///
    /// Waits until any active session has ended and any other start or end
    /// in progress has finished.
    pub async fn start_session(&self, config: Option<AssociationConfig>) -> Result<(), SessionError> {
        if self.has_active_session() {
            debug!("startSession waiting for the active session to end");
        }
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| SessionError::StartFailed(e.to_string()))?;
        let lock = self.lock.lock().await;
        debug!(?config, "startSession");

        let guard = TransitionGuard::new(lock, &self.slot, &self.router, self.config.request_code);
        match self.establish(config.as_ref(), permit).await {
            Ok(session) => {
                guard.commit(session);
                info!("session established");
                Ok(())
            }
            Err(e) => {
                log_start_failure(&e);
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        config: Option<&AssociationConfig>,
        permit: OwnedSemaphorePermit,
    ) -> Result<ActiveSession, SessionError> {
        let base_uri = self
            .config
            .resolve_base_uri(config)
            .map_err(|e| SessionError::StartFailed(e.to_string()))?;

        let association = self
            .transport
            .open(self.config.client_timeout())
            .map_err(|e| SessionError::StartFailed(e.to_string()))?;

        let associated = self.associate(base_uri.as_ref(), &association).await;
        match associated {
            Ok(client) => Ok(ActiveSession {
                client,
                association,
                _permit: permit,
            }),
            Err(SessionError::Cancelled) => {
                let timeout = self.config.association_timeout();
                tokio::spawn(async move { close_quietly(association.as_ref(), timeout).await });
                Err(SessionError::Cancelled)
            }
            Err(e) => {
                close_quietly(association.as_ref(), self.config.association_timeout()).await;
                Err(e)
            }
        }
    }

    /// Launch the wallet for `association` and wait for its protocol client.
    async fn associate(
        &self,
        base_uri: Option<&Url>,
        association: &Arc<dyn LocalAssociation>,
    ) -> Result<Arc<dyn ProtocolClient>, SessionError> {
        let intent = AssociationIntent::new(base_uri, association.port(), association.session_token())
            .map_err(|e| SessionError::StartFailed(e.to_string()))?;

        let request_code = self.config.request_code;
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        self.router.register(
            request_code,
            Box::new(move |result_code, _data| {
                if result_code == RESULT_CANCELED {
                    // The start may already be over; nothing to do then.
                    let _ = cancel_tx.send(());
                }
            }),
        );

        if let Err(e) = self.launcher.launch(&intent, request_code) {
            self.router.cancel(request_code);
            return Err(match e {
                LaunchError::TargetNotFound(target) => SessionError::WalletNotFound(target),
                other => SessionError::StartFailed(other.to_string()),
            });
        }
        debug!(uri = %intent, "launched wallet for local association");

        let cancelled = async {
            match cancel_rx.await {
                Ok(()) => (),
                // Callback ran with a non-cancel result; keep waiting on the handshake.
                Err(_) => std::future::pending().await,
            }
        };
        let handshake = tokio::time::timeout(self.config.association_timeout(), association.start());

        tokio::select! {
            biased;

            _ = cancelled => {
                warn!("Local association cancelled by user, ending session");
                Err(SessionError::Cancelled)
            }
            outcome = handshake => match outcome {
                Ok(Ok(client)) => Ok(client),
                Ok(Err(TransportError::Timeout)) | Err(_) => Err(SessionError::HandshakeTimeout),
                Ok(Err(TransportError::Interrupted)) => Err(SessionError::Interrupted),
                Ok(Err(e)) => Err(SessionError::AssociationFailed(e)),
            },
        }
    }

    /// Invoke a method on the active session.
    ///
    /// Failures do not end the session. Calls are not serialized against
    /// each other.
    pub async fn invoke(&self, method: &str, params: Value) -> Result<Value, SessionError> {
        let client = self
            .slot
            .read()
            .as_ref()
            .map(|session| session.client.clone())
            .ok_or_else(|| SessionError::NoActiveSession(format!("invoke `{method}`")))?;

        self.gateway.invoke(client.as_ref(), method, params).await
    }

    /// Close the active session.
    ///
    /// The session is cleared whatever the outcome of closing the
    /// association.
    pub async fn end_session(&self) -> Result<(), SessionError> {
        let lock = self.lock.lock().await;
        let association = match self.slot.read().as_ref() {
            Some(session) => session.association.clone(),
            None => return Err(SessionError::NoActiveSession("end a session".into())),
        };
        let _guard = TransitionGuard::new(lock, &self.slot, &self.router, self.config.request_code);
        debug!("endSession");

        match tokio::time::timeout(self.config.association_timeout(), association.close()).await {
            Ok(Ok(())) => {
                info!("session ended");
                Ok(())
            }
            Ok(Err(TransportError::Timeout)) | Err(_) => {
                error!("Timed out waiting for local association to close");
                Err(SessionError::CloseTimeout)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to end session");
                Err(SessionError::EndFailed(e.to_string()))
            }
        }
    }
}

async fn close_quietly(association: &dyn LocalAssociation, timeout: Duration) {
    match tokio::time::timeout(timeout, association.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "failed to close abandoned association"),
        Err(_) => warn!("timed out closing abandoned association"),
    }
}

fn log_start_failure(e: &SessionError) {
    match e {
        SessionError::WalletNotFound(_) => {
            error!("Found no installed wallet that supports the mobile wallet protocol")
        }
        SessionError::HandshakeTimeout => {
            error!("Timed out waiting for local association to be ready")
        }
        SessionError::Interrupted => {
            warn!("Interrupted while waiting for local association to be ready")
        }
        SessionError::AssociationFailed(cause) => {
            error!(%cause, "Failed establishing local association with wallet")
        }
        SessionError::Cancelled => {}
        other => error!(error = %other, "Failed to start session"),
    }
}

// ============================================================================
// Tests
// ============================================================================
