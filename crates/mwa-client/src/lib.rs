//! Caller-facing API of the mobile wallet adapter bridge.
//!
//! [`transact`] opens a wallet session on a [`NativeModule`], runs a callback
//! with a [`MobileWallet`] handle and always ends the session afterwards.
//! [`transact_web3`] hands out a [`Web3MobileWallet`] instead, whose signing
//! calls take and return typed transactions and raw bytes.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use mwa_client::{transact, MobileWalletError};
//! # async fn example(module: Arc<dyn mwa_core::NativeModule>) -> Result<(), MobileWalletError> {
//! let auth = transact(module, None, |wallet| async move {
//!     wallet
//!         .authorize(serde_json::json!({ "cluster": "mainnet-beta" }))
//!         .await
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod naming;
pub mod transaction;
pub mod wallet;
pub mod web3;

mod transact;

#[cfg(test)]
mod testing;

pub use error::{translate, MobileWalletError};
pub use mwa_core::{AssociationConfig, ErrorKind, NativeModule};
pub use transact::{transact, transact_web3};
pub use transaction::{
    CodecError, LegacyTransaction, MessageVersion, SerializeConfig, Signature, Transaction,
    VersionedTransaction,
};
pub use wallet::{MobileWallet, WalletMethod};
pub use web3::{
    SignAndSendTransactionsParams, SignMessagesParams, SignTransactionsParams, Web3MobileWallet,
};
