//! The capability handle handed to `transact` callbacks.
//!
//! Every member of the handle is a [`WalletMethod`] bound to the protocol
//! method derived from the member name. The well-known members are bound
//! when the handle is created; any other member is bound on first access and
//! kept for the lifetime of the handle. Bindings are never replaced or
//! removed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use mwa_core::NativeModule;

use crate::error::{translate, MobileWalletError};
use crate::naming::to_method_name;

pub const AUTHORIZE: &str = "authorize";
pub const DEAUTHORIZE: &str = "deauthorize";
pub const REAUTHORIZE: &str = "reauthorize";
pub const CLONE_AUTHORIZATION: &str = "cloneAuthorization";
pub const GET_CAPABILITIES: &str = "getCapabilities";
pub const SIGN_AND_SEND_TRANSACTIONS: &str = "signAndSendTransactions";
pub const SIGN_TRANSACTIONS: &str = "signTransactions";
pub const SIGN_MESSAGES: &str = "signMessages";

/// Members bound when a handle is created
pub const KNOWN_MEMBERS: [&str; 8] = [
    AUTHORIZE,
    DEAUTHORIZE,
    REAUTHORIZE,
    CLONE_AUTHORIZATION,
    GET_CAPABILITIES,
    SIGN_AND_SEND_TRANSACTIONS,
    SIGN_TRANSACTIONS,
    SIGN_MESSAGES,
];

/// A member of the handle, bound to one protocol method.
#[derive(Clone)]
pub struct WalletMethod {
    member: Arc<str>,
    method: Arc<str>,
    module: Arc<dyn NativeModule>,
}

impl WalletMethod {
    fn bind(member: &str, module: Arc<dyn NativeModule>) -> Self {
        Self {
            member: member.into(),
            method: to_method_name(member).into(),
            module,
        }
    }

    /// Member name this method was bound from
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Protocol method name
    pub fn name(&self) -> &str {
        &self.method
    }

    /// Invoke the method once. Bridge failures come back translated.
    pub async fn call(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.module
            .invoke(&self.method, params)
            .await
            .map_err(translate)
    }
}

impl std::fmt::Debug for WalletMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletMethod")
            .field("member", &self.member)
            .field("method", &self.method)
            .finish()
    }
}

struct Registry {
    module: Arc<dyn NativeModule>,
    methods: RwLock<HashMap<String, WalletMethod>>,
}

/// Capability handle for the active session.
///
/// Cloning is cheap; clones share the same bindings.
#[derive(Clone)]
pub struct MobileWallet {
    registry: Arc<Registry>,
}

impl MobileWallet {
    pub fn new(module: Arc<dyn NativeModule>) -> Self {
        let methods = KNOWN_MEMBERS
            .iter()
            .map(|member| (member.to_string(), WalletMethod::bind(member, module.clone())))
            .collect();

        Self {
            registry: Arc::new(Registry {
                module,
                methods: RwLock::new(methods),
            }),
        }
    }

    /// The method bound to `member`, binding it on first access.
    pub fn method(&self, member: &str) -> WalletMethod {
        if let Some(method) = self.registry.methods.read().get(member) {
            return method.clone();
        }

        let mut methods = self.registry.methods.write();
        methods
            .entry(member.to_string())
            .or_insert_with(|| {
                trace!(member, "binding wallet method");
                WalletMethod::bind(member, self.registry.module.clone())
            })
            .clone()
    }

    /// Whether `member` has been bound
    pub fn is_bound(&self, member: &str) -> bool {
        self.registry.methods.read().contains_key(member)
    }

    /// Names of every bound member
    pub fn members(&self) -> Vec<String> {
        let mut members: Vec<_> = self.registry.methods.read().keys().cloned().collect();
        members.sort();
        members
    }

    /// Call `member` with `params`.
    pub async fn call(&self, member: &str, params: Value) -> Result<Value, MobileWalletError> {
        self.method(member).call(params).await
    }

    pub async fn authorize(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.call(AUTHORIZE, params).await
    }

    pub async fn deauthorize(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.call(DEAUTHORIZE, params).await
    }

    pub async fn reauthorize(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.call(REAUTHORIZE, params).await
    }

    pub async fn clone_authorization(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.call(CLONE_AUTHORIZATION, params).await
    }

    pub async fn get_capabilities(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.call(GET_CAPABILITIES, params).await
    }

    /// Raw `sign_and_send_transactions`: base64 payloads in, base64 signatures out
    pub async fn sign_and_send_transactions(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.call(SIGN_AND_SEND_TRANSACTIONS, params).await
    }

    /// Raw `sign_transactions`: base64 payloads in and out
    pub async fn sign_transactions(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.call(SIGN_TRANSACTIONS, params).await
    }

    /// Raw `sign_messages`: base64 payloads in and out
    pub async fn sign_messages(&self, params: Value) -> Result<Value, MobileWalletError> {
        self.call(SIGN_MESSAGES, params).await
    }
}

impl std::fmt::Debug for MobileWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileWallet")
            .field("members", &self.members())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
