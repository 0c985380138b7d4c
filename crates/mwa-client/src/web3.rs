//! Typed wallet handle working with transactions and raw bytes.
//!
//! [`Web3MobileWallet`] reshapes the three signing calls between typed
//! values and the base64 payloads the protocol carries. Every other member
//! is the plain [`MobileWallet`] one, reached through `Deref`.

use std::ops::Deref;

use serde_json::{Map, Value};

use crate::error::MobileWalletError;
use crate::transaction::{decode_payload, encode_payload, CodecError, Transaction};
use crate::wallet::MobileWallet;

/// Parameters of [`Web3MobileWallet::sign_and_send_transactions`]
#[derive(Clone, Debug, Default)]
pub struct SignAndSendTransactionsParams {
    pub transactions: Vec<Transaction>,
    /// Sent as `options.min_context_slot`
    pub min_context_slot: Option<u64>,
    /// Extra request fields, passed through as they are
    pub rest: Map<String, Value>,
}

/// Parameters of [`Web3MobileWallet::sign_transactions`]
#[derive(Clone, Debug, Default)]
pub struct SignTransactionsParams {
    pub transactions: Vec<Transaction>,
    pub rest: Map<String, Value>,
}

/// Parameters of [`Web3MobileWallet::sign_messages`]
#[derive(Clone, Debug, Default)]
pub struct SignMessagesParams {
    /// Base64 addresses of the accounts asked to sign
    pub addresses: Vec<String>,
    pub payloads: Vec<Vec<u8>>,
    pub rest: Map<String, Value>,
}

/// Wallet handle with typed signing calls.
#[derive(Clone, Debug)]
pub struct Web3MobileWallet {
    wallet: MobileWallet,
}

impl Web3MobileWallet {
    pub fn new(wallet: MobileWallet) -> Self {
        Self { wallet }
    }

    /// The untyped handle underneath
    pub fn inner(&self) -> &MobileWallet {
        &self.wallet
    }

    /// Sign and submit `transactions`. Returns base58 transaction signatures.
    pub async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> Result<Vec<String>, MobileWalletError> {
        let SignAndSendTransactionsParams {
            transactions,
            min_context_slot,
            rest,
        } = params;

        let mut request = rest;
        if let Some(slot) = min_context_slot {
            let mut options = Map::new();
            options.insert("min_context_slot".into(), slot.into());
            request.insert("options".into(), Value::Object(options));
        }
        request.insert("payloads".into(), transaction_payloads(&transactions)?);

        let response = self
            .wallet
            .sign_and_send_transactions(Value::Object(request))
            .await?;

        decoded_list(&response, "signatures")?
            .into_iter()
            .map(|bytes| Ok(bs58::encode(bytes).into_string()))
            .collect()
    }

    /// Have the wallet sign `transactions` without submitting them.
    pub async fn sign_transactions(
        &self,
        params: SignTransactionsParams,
    ) -> Result<Vec<Transaction>, MobileWalletError> {
        let SignTransactionsParams { transactions, rest } = params;

        let mut request = rest;
        request.insert("payloads".into(), transaction_payloads(&transactions)?);

        let response = self.wallet.sign_transactions(Value::Object(request)).await?;

        decoded_list(&response, "signed_payloads")?
            .iter()
            .map(|bytes| Transaction::from_wire_bytes(bytes).map_err(MobileWalletError::from))
            .collect()
    }

    /// Have the wallet sign arbitrary messages. Returns the signed payloads.
    pub async fn sign_messages(
        &self,
        params: SignMessagesParams,
    ) -> Result<Vec<Vec<u8>>, MobileWalletError> {
        let SignMessagesParams {
            addresses,
            payloads,
            rest,
        } = params;

        let mut request = rest;
        request.insert("addresses".into(), addresses.into());
        request.insert(
            "payloads".into(),
            payloads
                .iter()
                .map(|payload| Value::String(encode_payload(payload)))
                .collect(),
        );

        let response = self.wallet.sign_messages(Value::Object(request)).await?;
        Ok(decoded_list(&response, "signed_payloads")?)
    }
}

impl Deref for Web3MobileWallet {
    type Target = MobileWallet;

    fn deref(&self) -> &MobileWallet {
        &self.wallet
    }
}

fn transaction_payloads(transactions: &[Transaction]) -> Result<Value, CodecError> {
    transactions
        .iter()
        .map(|tx| tx.to_wire_payload().map(Value::String))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Decode the base64 strings listed under `field` of a response.
fn decoded_list(response: &Value, field: &'static str) -> Result<Vec<Vec<u8>>, CodecError> {
    response
        .get(field)
        .and_then(Value::as_array)
        .ok_or(CodecError::MissingField(field))?
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or(CodecError::MissingField(field))
                .and_then(decode_payload)
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
