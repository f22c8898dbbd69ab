//! Swap persistence (spec.md §4.H ambient stack)
//!
//! Mirrors the teacher's storage-trait split (`DepositStore`: SQLite for
//! production, in-memory for tests) applied to [`ActiveSwap`] instead of a
//! Bitcoin deposit record.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::coordinator::types::{ActiveSwap, Phase, TradeId};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("swap not found: {0}")]
    NotFound(String),

    #[error("swap already exists: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("connection error: {0}")]
    Connection(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable storage for in-flight and historical swaps.
#[async_trait]
pub trait SwapStore: Send + Sync {
    async fn insert(&self, swap: &ActiveSwap) -> StorageResult<()>;
    async fn update(&self, swap: &ActiveSwap) -> StorageResult<()>;
    async fn get(&self, trade_id: &TradeId) -> StorageResult<Option<ActiveSwap>>;
    async fn get_by_phase(&self, phase: Phase) -> StorageResult<Vec<ActiveSwap>>;
    /// Every swap not yet in a terminal phase — what a restarted process
    /// needs to rehydrate and resume watching.
    async fn get_active(&self) -> StorageResult<Vec<ActiveSwap>>;
    async fn delete(&self, trade_id: &TradeId) -> StorageResult<bool>;
}
