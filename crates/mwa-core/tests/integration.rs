//! Integration tests for the session lifecycle.
//!
//! These tests drive a session manager through the flows a wallet session
//! goes through in practice:
//! - Start, invoke, end
//! - Failed starts (no wallet, user cancel, handshake timeout)
//! - Repeated sessions on the same manager

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use mwa_core::harness::{fast_config, mock_manager, wait_for_closes};
use mwa_core::{ErrorKind, SessionManager, RESULT_CANCELED};
use mwa_transport::testing::{
    sample_capabilities, HandshakeBehavior, LaunchBehavior, MockAssociationTransport, MockLauncher,
};

/// Test: sequential sessions each complete their own cycle
#[tokio::test]
async fn integration_sequential_sessions() {
    let (manager, transport, launcher) = mock_manager();
    transport
        .client()
        .respond("get_capabilities", sample_capabilities());

    for _ in 0..3 {
        manager.start_session(None).await.unwrap();
        let caps = manager.invoke("get_capabilities", json!({})).await.unwrap();
        assert_eq!(caps["max_transactions_per_request"], 10);
        manager.end_session().await.unwrap();
        assert!(!manager.has_active_session());
    }

    assert_eq!(transport.opened_count(), 3);
    assert_eq!(transport.closed_count(), 3);
    assert_eq!(launcher.launched().len(), 3);
}

/// Test: every failed start leaves the manager idle and reusable
#[tokio::test]
async fn integration_failed_starts_leave_manager_idle() {
    let (manager, transport, launcher) = mock_manager();

    launcher.set_behavior(LaunchBehavior::TargetNotFound);
    let err = manager.start_session(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!manager.has_active_session());
    assert!(!manager.is_locked());

    launcher.set_behavior(LaunchBehavior::Succeed);
    transport.set_handshake(HandshakeBehavior::Hang);
    let err = manager.start_session(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(!manager.has_active_session());
    assert!(!manager.is_locked());

    transport.set_handshake(HandshakeBehavior::Succeed);
    manager.start_session(None).await.unwrap();
    assert!(manager.has_active_session());
    assert!(!manager.is_locked());
    manager.end_session().await.unwrap();
}

/// Test: a cancellation delivered from another thread fails the start promptly
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn integration_cancel_from_platform_thread() {
    let transport = Arc::new(MockAssociationTransport::new());
    transport.set_handshake(HandshakeBehavior::Hang);
    let launcher = Arc::new(MockLauncher::new());
    let manager = SessionManager::new(fast_config(), transport.clone(), launcher.clone());

    let router = manager.router().clone();
    launcher.on_launch(move |code| {
        let router = router.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            router.deliver(code, RESULT_CANCELED, None);
        });
    });

    let err = manager.start_session(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!manager.has_active_session());
    assert!(!manager.is_locked());
    assert!(wait_for_closes(&transport, 1).await);

    // A late duplicate delivery is ignored.
    assert!(!manager.router().deliver(0, RESULT_CANCELED, None));
}

/// Test: invoke and end without a session are precondition violations
#[tokio::test]
async fn integration_precondition_violations() {
    let (manager, _transport, _launcher) = mock_manager();

    let err = manager.invoke("get_capabilities", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    let err = manager.end_session().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
}

/// Test: a remote error code survives to the structured boundary error
#[tokio::test]
async fn integration_remote_error_code() {
    let (manager, _transport, _launcher) = mock_manager();
    manager.start_session(None).await.unwrap();

    let err = manager
        .invoke("get_capabilities", json!({}))
        .await
        .unwrap_err()
        .to_structured();
    assert_eq!(err.code.as_deref(), Some("JSON_RPC_ERROR"));
    assert_eq!(err.json_rpc_error_code(), Some(-32601));

    manager.end_session().await.unwrap();
}

/// Test: a start issued during an active session runs once that session ends
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn integration_queued_start_runs_after_end() {
    let (manager, transport, _launcher) = mock_manager();
    let manager = Arc::new(manager);
    manager.start_session(None).await.unwrap();

    let queued = tokio::spawn({
        let manager = manager.clone();
        async move {
            manager.start_session(None).await?;
            manager.end_session().await
        }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(transport.opened_count(), 1);
    manager.end_session().await.unwrap();

    queued.await.unwrap().unwrap();
    assert_eq!(transport.opened_count(), 2);
    assert_eq!(transport.closed_count(), 2);
    assert!(!manager.has_active_session());
}
