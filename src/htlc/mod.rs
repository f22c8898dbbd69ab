//! UTXO Hash Time-Locked Contract (spec.md §4.F)
//!
//! Used as the fallback swap method for UTXO chains without taproot
//! support. See [`script`] for the raw Bitcoin Script and [`session`] for
//! the stateful session built on top of it.

pub mod script;
pub mod session;

pub use script::{build_htlc_script, claim_witness, refund_witness};
pub use session::{HtlcError, HtlcSession, HtlcState};
