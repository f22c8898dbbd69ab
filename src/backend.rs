//! External chain backend contract (spec.md §6)
//!
//! This crate owns swap logic, not chain connectivity: every RPC call,
//! mempool subscription, and broadcast happens behind [`ChainBackend`],
//! implemented once per chain family by the embedding application. This
//! mirrors the storage-trait split the teacher uses for `DepositStore`
//! (SQLite vs in-memory) — here the "implementations" are per-chain RPC
//! clients instead, which is why this crate never links an RPC client of
//! its own.

use async_trait::async_trait;
use thiserror::Error;

/// Chain backend errors, folded into [`crate::error::SwapError`] as
/// `CoordinatorError::BackendError`/`BackendUnavailable` at the call site.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend is unavailable: {0}")]
    Unavailable(String),

    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}

/// A spendable UTXO, as reported by a backend for a watched address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub amount_sats: u64,
    pub confirmations: u32,
}

/// A raw, chain-agnostic transaction payload a [`ChainBackend`] broadcasts
/// verbatim. UTXO backends expect a serialized transaction; EVM backends
/// expect ABI-encoded call data plus a target contract address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxData {
    Raw(Vec<u8>),
    EvmCall { to: String, data: Vec<u8>, value_wei: u128 },
}

/// A chain event the coordinator reacts to: a transaction reaching an
/// address/confirmation threshold, or new tip height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    SeenInMempool { txid: String },
    Confirmed { txid: String, confirmations: u32, block_height: u64 },
    NewTip { height: u64 },
}

/// A decoded contract event, for EVM backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub tx_hash: String,
    pub contract_address: String,
    pub event_name: String,
    pub data: Vec<u8>,
    pub block_height: u64,
}

/// Per-chain RPC/mempool access, implemented outside this crate.
///
/// Every method is fallible with [`BackendError`] and every method that
/// performs I/O is `async` — [`crate::coordinator::service::SwapCoordinator`]
/// wraps calls to this trait in retry-with-backoff (spec.md §7) and treats
/// `BackendError::Unavailable`/`Rpc` as retryable, everything else as fatal
/// to the current operation.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ChainBackend: Send + Sync {
    /// Current chain tip height.
    async fn current_height(&self) -> Result<u64, BackendError>;

    /// UTXOs currently sitting at `address` (UTXO chains only).
    async fn utxos_for_address(&self, address: &str) -> Result<Vec<Utxo>, BackendError>;

    /// Broadcast a signed transaction / contract call.
    async fn broadcast(&self, tx: TxData) -> Result<String, BackendError>;

    /// Look up confirmations for a previously broadcast transaction.
    async fn confirmations(&self, txid: &str) -> Result<u32, BackendError>;

    /// Fetch decoded logs emitted by `contract_address` since `from_height`
    /// (EVM chains only).
    async fn logs_since(&self, contract_address: &str, from_height: u64) -> Result<Vec<LogEvent>, BackendError>;

    /// Fetch the raw witness data for a transaction that spent `txid:vout`,
    /// used to extract a revealed HTLC preimage (UTXO chains only).
    async fn spending_witness(&self, txid: &str, vout: u32) -> Result<Option<Vec<Vec<u8>>>, BackendError>;
}

/// Signing/funding operations delegated to an external wallet, kept
/// separate from [`ChainBackend`] so a read-only backend (for watching)
/// can be composed with a different signer implementation.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Sign `sighash` with this wallet's key for `symbol`, returning a
    /// raw (64-byte Schnorr or 65-byte ECDSA) signature.
    async fn sign(&self, symbol: &str, sighash: &[u8]) -> Result<Vec<u8>, BackendError>;

    /// This wallet's public key for `symbol`, compressed SEC1 encoding.
    async fn public_key(&self, symbol: &str) -> Result<[u8; 33], BackendError>;
}
