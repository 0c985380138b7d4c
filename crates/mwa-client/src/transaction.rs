//! Transaction wire format.
//!
//! A serialized transaction is a compact-u16 signature count, that many
//! 64-byte ed25519 signatures, then the message. The first message byte
//! tells the two message encodings apart: legacy messages start with the
//! signer count (always below 128), versioned messages with `0x80 | version`.
//!
//! ```text
//! [count: compact-u16][signature: 64 bytes] * count [message ...]
//!
//! legacy message:    [num_required_signatures][ro_signed][ro_unsigned][keys: compact-u16 + 32 * n] ...
//! versioned message: [0x80 | version][num_required_signatures][ro_signed][ro_unsigned][keys ...] ...
//! ```

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Verifier, VerifyingKey};
use thiserror::Error;

/// Length of an ed25519 signature
pub const SIGNATURE_LENGTH: usize = 64;
/// Length of an account address
pub const PUBKEY_LENGTH: usize = 32;

const VERSION_PREFIX_MASK: u8 = 0x7f;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Transaction is truncated: {0}")]
    Truncated(&'static str),

    #[error("Invalid compact-u16 length prefix")]
    InvalidLength,

    #[error("Expected a {expected} message")]
    UnexpectedVersion { expected: &'static str },

    #[error("Message lists {keys} account keys but requires {required} signatures")]
    InvalidMessage { required: usize, keys: usize },

    #[error("Transaction has {actual} signatures, its message requires {expected}")]
    SignatureCountMismatch { expected: usize, actual: usize },

    #[error("Signature index {0} is out of range")]
    SignatureIndex(usize),

    #[error("Missing signature for signer {0}")]
    MissingSignature(usize),

    #[error("Signature verification failed for signer {0}")]
    InvalidSignature(usize),

    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    #[error("Response is missing `{0}`")]
    MissingField(&'static str),
}

impl From<base64::DecodeError> for CodecError {
    fn from(e: base64::DecodeError) -> Self {
        CodecError::Base64(e.to_string())
    }
}

// ============================================================================
// Wire primitives
// ============================================================================

/// Encode a wire payload as base64 text.
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text from the wire.
pub fn decode_payload(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text)?)
}

fn write_compact_u16(out: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Returns the decoded value and the number of bytes it occupied.
fn read_compact_u16(bytes: &[u8]) -> Result<(usize, usize), CodecError> {
    let mut value: usize = 0;
    for (i, byte) in bytes.iter().take(3).enumerate() {
        value |= ((byte & 0x7f) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            if value > u16::MAX as usize || (i > 0 && *byte == 0) {
                return Err(CodecError::InvalidLength);
            }
            return Ok((value, i + 1));
        }
    }
    if bytes.len() < 3 {
        Err(CodecError::Truncated("length prefix"))
    } else {
        Err(CodecError::InvalidLength)
    }
}

// ============================================================================
// Signatures
// ============================================================================

/// A 64-byte ed25519 signature. Displayed in base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    pub fn new(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; SIGNATURE_LENGTH]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// The placeholder written for a signer that has not signed yet
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Encoding of a transaction message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageVersion {
    Legacy,
    V(u8),
}

impl MessageVersion {
    /// Read the version marker at the start of a serialized message.
    pub fn of(message: &[u8]) -> Result<Self, CodecError> {
        let prefix = *message.first().ok_or(CodecError::Truncated("message"))?;
        let masked = prefix & VERSION_PREFIX_MASK;
        if masked == prefix {
            Ok(MessageVersion::Legacy)
        } else {
            Ok(MessageVersion::V(masked))
        }
    }
}

/// Signer count and signer keys of a message header.
struct MessageHeader<'a> {
    num_required_signatures: usize,
    signer_keys: Vec<&'a [u8]>,
}

impl<'a> MessageHeader<'a> {
    /// `header` starts at the required-signatures byte.
    fn parse(header: &'a [u8]) -> Result<Self, CodecError> {
        if header.len() < 3 {
            return Err(CodecError::Truncated("message header"));
        }
        let num_required_signatures = header[0] as usize;

        let (keys, prefix_len) = read_compact_u16(&header[3..])?;
        if keys < num_required_signatures {
            return Err(CodecError::InvalidMessage {
                required: num_required_signatures,
                keys,
            });
        }
        let start = 3 + prefix_len;
        let end = start + num_required_signatures * PUBKEY_LENGTH;
        let signers = header
            .get(start..end)
            .ok_or(CodecError::Truncated("account keys"))?;

        Ok(Self {
            num_required_signatures,
            signer_keys: signers.chunks_exact(PUBKEY_LENGTH).collect(),
        })
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// Options for [`LegacyTransaction::serialize_with`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeConfig {
    /// Fail if any signer has not signed
    pub require_all_signatures: bool,
    /// Verify every present signature against its signer key
    pub verify_signatures: bool,
}

impl Default for SerializeConfig {
    fn default() -> Self {
        Self {
            require_all_signatures: true,
            verify_signatures: true,
        }
    }
}

impl SerializeConfig {
    /// Partially signed, unverified: the form handed to a wallet for signing
    pub const PARTIAL: Self = Self {
        require_all_signatures: false,
        verify_signatures: false,
    };
}

/// Transaction with a legacy message. Unsigned signers hold `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransaction {
    signatures: Vec<Option<Signature>>,
    message: Vec<u8>,
}

impl LegacyTransaction {
    /// Unsigned transaction for a serialized legacy message.
    pub fn new(message: Vec<u8>) -> Result<Self, CodecError> {
        if MessageVersion::of(&message)? != MessageVersion::Legacy {
            return Err(CodecError::UnexpectedVersion { expected: "legacy" });
        }
        let header = MessageHeader::parse(&message)?;
        Ok(Self {
            signatures: vec![None; header.num_required_signatures],
            message,
        })
    }

    pub fn signatures(&self) -> &[Option<Signature>] {
        &self.signatures
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Signature of the fee payer, which identifies the transaction
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first().and_then(Option::as_ref)
    }

    /// Set the signature for signer `index`.
    pub fn add_signature(&mut self, index: usize, signature: Signature) -> Result<(), CodecError> {
        let slot = self
            .signatures
            .get_mut(index)
            .ok_or(CodecError::SignatureIndex(index))?;
        *slot = Some(signature);
        Ok(())
    }

    /// Serialize requiring every signature, each verified.
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        self.serialize_with(SerializeConfig::default())
    }

    pub fn serialize_with(&self, config: SerializeConfig) -> Result<Vec<u8>, CodecError> {
        let header = MessageHeader::parse(&self.message)?;
        if header.num_required_signatures != self.signatures.len() {
            return Err(CodecError::SignatureCountMismatch {
                expected: header.num_required_signatures,
                actual: self.signatures.len(),
            });
        }

        for (index, signature) in self.signatures.iter().enumerate() {
            match signature {
                None if config.require_all_signatures => {
                    return Err(CodecError::MissingSignature(index))
                }
                None => {}
                Some(signature) if config.verify_signatures => {
                    verify(header.signer_keys[index], signature, &self.message)
                        .map_err(|_| CodecError::InvalidSignature(index))?;
                }
                Some(_) => {}
            }
        }

        let placeholder = [0u8; SIGNATURE_LENGTH];
        Ok(write_transaction(
            self.signatures
                .iter()
                .map(|s| s.as_ref().map_or(&placeholder, Signature::as_bytes)),
            self.signatures.len(),
            &self.message,
        ))
    }

    fn from_parts(signatures: Vec<Signature>, message: Vec<u8>) -> Self {
        Self {
            signatures: signatures
                .into_iter()
                .map(|s| (!s.is_empty()).then_some(s))
                .collect(),
            message,
        }
    }
}

/// Transaction with a versioned message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedTransaction {
    signatures: Vec<Signature>,
    message: Vec<u8>,
}

impl VersionedTransaction {
    /// Transaction for a serialized versioned message, with every signature
    /// slot zero-filled.
    pub fn new(message: Vec<u8>) -> Result<Self, CodecError> {
        if MessageVersion::of(&message)? == MessageVersion::Legacy {
            return Err(CodecError::UnexpectedVersion { expected: "versioned" });
        }
        let header = MessageHeader::parse(&message[1..])?;
        Ok(Self {
            signatures: vec![Signature::new([0; SIGNATURE_LENGTH]); header.num_required_signatures],
            message,
        })
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Version number from the message prefix
    pub fn version(&self) -> u8 {
        match MessageVersion::of(&self.message) {
            Ok(MessageVersion::V(version)) => version,
            _ => 0,
        }
    }

    pub fn add_signature(&mut self, index: usize, signature: Signature) -> Result<(), CodecError> {
        let slot = self
            .signatures
            .get_mut(index)
            .ok_or(CodecError::SignatureIndex(index))?;
        *slot = signature;
        Ok(())
    }

    /// Serialize with the signatures as they are.
    pub fn serialize(&self) -> Vec<u8> {
        write_transaction(
            self.signatures.iter().map(Signature::as_bytes),
            self.signatures.len(),
            &self.message,
        )
    }
}

/// Either transaction shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Legacy(LegacyTransaction),
    Versioned(VersionedTransaction),
}

impl Transaction {
    /// Parse serialized transaction bytes, picking the shape from the
    /// message version marker.
    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let (count, prefix_len) = read_compact_u16(bytes)?;
        let message_offset = prefix_len + count * SIGNATURE_LENGTH;
        if bytes.len() <= message_offset {
            return Err(CodecError::Truncated("signatures"));
        }

        let signatures = bytes[prefix_len..message_offset]
            .chunks_exact(SIGNATURE_LENGTH)
            .filter_map(Signature::from_slice)
            .collect::<Vec<_>>();
        let message = bytes[message_offset..].to_vec();

        match MessageVersion::of(&message)? {
            MessageVersion::Legacy => Ok(Transaction::Legacy(LegacyTransaction::from_parts(
                signatures, message,
            ))),
            MessageVersion::V(_) => Ok(Transaction::Versioned(VersionedTransaction {
                signatures,
                message,
            })),
        }
    }

    /// Decode a base64 payload returned by a wallet.
    pub fn from_wire_payload(payload: &str) -> Result<Self, CodecError> {
        Self::from_wire_bytes(&decode_payload(payload)?)
    }

    /// Bytes handed to a wallet: versioned transactions as they are, legacy
    /// transactions partially signed and unverified.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Transaction::Legacy(tx) => tx.serialize_with(SerializeConfig::PARTIAL),
            Transaction::Versioned(tx) => Ok(tx.serialize()),
        }
    }

    /// Base64 form of [`Transaction::to_wire_bytes`]
    pub fn to_wire_payload(&self) -> Result<String, CodecError> {
        Ok(encode_payload(&self.to_wire_bytes()?))
    }

    pub fn message(&self) -> &[u8] {
        match self {
            Transaction::Legacy(tx) => tx.message(),
            Transaction::Versioned(tx) => tx.message(),
        }
    }

    pub fn version(&self) -> MessageVersion {
        match self {
            Transaction::Legacy(_) => MessageVersion::Legacy,
            Transaction::Versioned(tx) => MessageVersion::V(tx.version()),
        }
    }
}

impl From<LegacyTransaction> for Transaction {
    fn from(tx: LegacyTransaction) -> Self {
        Transaction::Legacy(tx)
    }
}

impl From<VersionedTransaction> for Transaction {
    fn from(tx: VersionedTransaction) -> Self {
        Transaction::Versioned(tx)
    }
}

fn write_transaction<'a>(
    signatures: impl Iterator<Item = &'a [u8; SIGNATURE_LENGTH]>,
    count: usize,
    message: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + count * SIGNATURE_LENGTH + message.len());
    // Signer counts come from a single header byte, so they always fit.
    write_compact_u16(&mut out, count as u16);
    for signature in signatures {
        out.extend_from_slice(signature);
    }
    out.extend_from_slice(message);
    out
}

fn verify(key: &[u8], signature: &Signature, message: &[u8]) -> Result<(), ed25519_dalek::SignatureError> {
    let key: &[u8; PUBKEY_LENGTH] = key
        .try_into()
        .map_err(|_| ed25519_dalek::SignatureError::new())?;
    let key = VerifyingKey::from_bytes(key)?;
    key.verify(message, &ed25519_dalek::Signature::from_bytes(signature.as_bytes()))
}

// ============================================================================
// Tests
// ============================================================================
