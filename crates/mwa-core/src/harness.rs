//! Test harness for driving a session manager against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use mwa_transport::testing::{MockAssociationTransport, MockLauncher};

use crate::config::BridgeConfig;
use crate::session::SessionManager;

/// Short timeouts so failure paths resolve quickly in tests
pub fn fast_config() -> BridgeConfig {
    BridgeConfig {
        association_timeout_ms: 100,
        client_timeout_ms: 250,
        ..BridgeConfig::default()
    }
}

/// Session manager wired to a mock transport and launcher.
pub fn mock_manager() -> (SessionManager, Arc<MockAssociationTransport>, Arc<MockLauncher>) {
    let transport = Arc::new(MockAssociationTransport::new());
    let launcher = Arc::new(MockLauncher::new());
    let manager = SessionManager::new(fast_config(), transport.clone(), launcher.clone());
    (manager, transport, launcher)
}

/// Wait up to a second for `transport` to have seen `count` closes.
///
/// A cancelled start closes its association in the background.
pub async fn wait_for_closes(transport: &MockAssociationTransport, count: usize) -> bool {
    for _ in 0..100 {
        if transport.closed_count() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    transport.closed_count() >= count
}
