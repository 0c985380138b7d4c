//! Local association transport abstractions for the mobile wallet adapter bridge.
//!
//! The bridge never speaks to a wallet directly. It opens a local
//! association, launches the wallet with a URI describing that association,
//! and then exchanges JSON-RPC calls over the protocol client the handshake
//! yields. This crate defines those collaborators as traits so the session
//! logic stays platform independent.

pub mod intent;
pub mod testing;
pub mod traits;

pub use intent::*;
pub use traits::*;
