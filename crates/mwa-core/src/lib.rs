//! Mobile wallet adapter bridge core.
//!
//! This crate implements:
//! - Session lifecycle (one session per process, serialized transitions)
//! - Activity result routing for the wallet launch
//! - Method invocation over the active session
//! - The structured error taxonomy crossing the bridge boundary
//! - Bridge configuration

#![forbid(unsafe_code)]

// Session lifecycle
pub mod session;
pub mod router;
pub mod gateway;

// Boundary
pub mod boundary;
pub mod errors;
pub mod config;

// Supporting modules
pub mod harness;

pub use boundary::{NativeModule, NoopModule};
pub use config::{AssociationConfig, BridgeConfig, ConfigError};
pub use errors::{ErrorKind, SessionError, StructuredError};
pub use router::{ActivityResultData, ActivityResultRouter, RESULT_CANCELED, RESULT_OK};
pub use session::SessionManager;
