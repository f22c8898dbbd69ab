//! EVM HTLC session (spec.md §4.G)
//!
//! ABI-only: this crate never instantiates a live `alloy` provider. Chain
//! reads/writes go through the external `ChainBackend` trait
//! (spec.md §6); this module only encodes call data and decodes log data.

pub mod abi;
pub mod session;

pub use session::{EvmHtlcError, EvmHtlcSession, EvmHtlcState};
