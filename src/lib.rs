//! Cross-Chain Atomic Swap Coordinator
//!
//! Orchestrates trustless swaps between Bitcoin-like/Taproot, EVM, Monero,
//! and Solana-contract chains using MuSig2 key aggregation, UTXO HTLCs,
//! adaptor signatures, and EVM contract HTLCs. This crate owns the
//! cryptographic protocol and swap state machine; chain connectivity
//! (RPC, mempool watching, broadcasting) is supplied by the embedding
//! application through [`backend::ChainBackend`].
//!
//! ## Modules
//!
//! - [`registry`] — immutable per-chain parameters and supported methods
//! - [`timeout`] — block-denominated timeout policy
//! - [`secret`] — the swap's hash-lock preimage and its verification
//! - [`musig2_session`] — two-party MuSig2 over a taproot output
//! - [`taproot`] — the taproot script tree a MuSig2 leg spends from
//! - [`htlc`] — the fallback UTXO HTLC for non-taproot chains
//! - [`adaptor`] — scriptless-script adaptor signatures for Monero legs
//! - [`evm`] — ABI encode/decode for EVM HTLC contracts
//! - [`backend`] — the external chain-connectivity contract
//! - [`p2p`] — wire messages exchanged between counterparties
//! - [`events`] — swap lifecycle event fan-out
//! - [`persistence`] — durable swap storage
//! - [`coordinator`] — the swap state machine tying everything together
//! - [`fees`], [`units`] — fee math and amount formatting
//! - [`config`], [`logging`] — ambient configuration and structured logging

pub mod adaptor;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod evm;
pub mod fees;
pub mod htlc;
pub mod logging;
pub mod musig2_session;
pub mod p2p;
pub mod persistence;
pub mod registry;
pub mod retry;
pub mod secret;
pub mod taproot;
pub mod timeout;
pub mod units;

pub use config::{CoordinatorConfig, Network};
pub use coordinator::{CoordinatorError, SwapCoordinator};
pub use error::{Result, SwapError};
pub use events::{EventBus, SwapEvent};
pub use registry::{ChainRegistry, ChainRegistryBuilder};
