//! Method invocation over an established session.
//!
//! The gateway forwards a method call to the protocol client, bounds it with
//! a timeout and sorts failures into three channels:
//! - remote JSON-RPC errors keep their numeric code
//! - local timeouts and transport failures pass through with a description
//! - anything else becomes a generic failure carrying method and params

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error};

use mwa_transport::{ProtocolClient, TransportError};

use crate::errors::SessionError;

/// Stateless forwarder for method calls.
#[derive(Clone, Copy, Debug)]
pub struct MethodGateway {
    timeout: Duration,
}

impl MethodGateway {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke `method` once. There are no retries.
    pub async fn invoke(
        &self,
        client: &dyn ProtocolClient,
        method: &str,
        params: Value,
    ) -> Result<Value, SessionError> {
        debug!(method, %params, "invoke");

        let call = client.method_call(method, params.clone(), self.timeout);
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout),
        };

        outcome.map_err(|e| {
            let mapped = classify(method, params, self.timeout, e);
            if !matches!(mapped, SessionError::Remote { .. }) {
                error!(method, error = %mapped, "Failed to invoke method");
            }
            mapped
        })
    }
}

fn classify(method: &str, params: Value, timeout: Duration, error: TransportError) -> SessionError {
    match error {
        TransportError::Remote { code, message } => SessionError::Remote { code, message },
        TransportError::Timeout => SessionError::InvocationTimeout {
            method: method.to_string(),
            timeout,
        },
        e @ (TransportError::Interrupted
        | TransportError::ConnectionFailed(_)
        | TransportError::Closed) => SessionError::InvocationTransport {
            method: method.to_string(),
            source: e,
        },
        TransportError::Other(message) => SessionError::InvocationFailed {
            method: method.to_string(),
            params,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use mwa_transport::testing::MockProtocolClient;
    use serde_json::json;

    fn gateway() -> MethodGateway {
        MethodGateway::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_forwards_result() {
        let client = MockProtocolClient::new();
        client.respond("get_capabilities", json!({ "max_transactions_per_request": 5 }));

        let result = gateway()
            .invoke(&client, "get_capabilities", json!({}))
            .await
            .unwrap();
        assert_eq!(result["max_transactions_per_request"], 5);
        assert_eq!(client.calls(), vec![("get_capabilities".to_string(), json!({}))]);
    }

    #[tokio::test]
    async fn test_remote_error_keeps_code() {
        let client = MockProtocolClient::new();
        client.fail(
            "authorize",
            TransportError::Remote {
                code: -1,
                message: "authorization declined".into(),
            },
        );

        let err = gateway()
            .invoke(&client, "authorize", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteProtocol);
        assert_eq!(err.to_structured().json_rpc_error_code(), Some(-1));
    }

    #[tokio::test]
    async fn test_local_timeout() {
        let client = MockProtocolClient::new().with_latency(Duration::from_secs(5));
        client.respond("authorize", json!({}));

        let err = gateway()
            .invoke(&client, "authorize", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvocationTimeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_transport_failure_passthrough() {
        let client = MockProtocolClient::new();
        client.fail("deauthorize", TransportError::Closed);

        let err = gateway()
            .invoke(&client, "deauthorize", json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Association closed"));
        assert_eq!(err.kind(), ErrorKind::Generic);
    }

    #[tokio::test]
    async fn test_other_failure_is_generic_with_params() {
        let client = MockProtocolClient::new();
        client.fail("sign_messages", TransportError::Other("bad response".into()));

        let params = json!({ "payloads": ["AQID"] });
        let err = gateway()
            .invoke(&client, "sign_messages", params.clone())
            .await
            .unwrap_err();
        match err {
            SessionError::InvocationFailed {
                method,
                params: p,
                message,
            } => {
                assert_eq!(method, "sign_messages");
                assert_eq!(p, params);
                assert_eq!(message, "bad response");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
