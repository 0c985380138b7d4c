//! Mobile wallet adapter native module for Android.
//!
//! This crate owns the background runtime the session lifecycle runs on and
//! exposes the bridge boundary (`startSession`, `invoke`, `endSession`) with
//! JSON payloads, plus the entry point for activity results.

mod bridge;
mod error;
mod logging;

pub use bridge::BridgeModule;
pub use error::BridgeError;
pub use logging::init_logging;
