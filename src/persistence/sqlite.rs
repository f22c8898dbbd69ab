//! SQLite-backed [`SwapStore`], pooled with r2d2 the way the teacher's
//! `SqliteDepositStore` is. `ActiveSwap` is stored as a JSON blob (it's a
//! sum-type-heavy struct, not a flat record) alongside a handful of indexed
//! columns used for the phase/active-set queries the trait needs.

use std::path::Path;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::coordinator::types::{ActiveSwap, Phase, TradeId};

use super::{StorageError, StorageResult, SwapStore};

pub struct SqliteSwapStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteSwapStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool.get().map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS swaps (
                trade_id TEXT PRIMARY KEY,
                phase TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                record_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_swaps_phase ON swaps(phase);
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    fn row_to_swap(row: &rusqlite::Row) -> rusqlite::Result<ActiveSwap> {
        let json: String = row.get("record_json")?;
        serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn phase_str(swap: &ActiveSwap) -> String {
        format!("{:?}", swap.phase)
    }
}

#[async_trait]
impl SwapStore for SqliteSwapStore {
    async fn insert(&self, swap: &ActiveSwap) -> StorageResult<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(swap).map_err(|e| StorageError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO swaps (trade_id, phase, updated_at, record_json) VALUES (?1, ?2, ?3, ?4)",
            params![swap.offer.trade_id, Self::phase_str(swap), swap.updated_at, json],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.extended_code == 1555 || err.extended_code == 2067 {
                    return StorageError::Duplicate(swap.offer.trade_id.clone());
                }
            }
            StorageError::Database(e.to_string())
        })?;
        Ok(())
    }

    async fn update(&self, swap: &ActiveSwap) -> StorageResult<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(swap).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let rows = conn
            .execute(
                "UPDATE swaps SET phase = ?2, updated_at = ?3, record_json = ?4 WHERE trade_id = ?1",
                params![swap.offer.trade_id, Self::phase_str(swap), swap.updated_at, json],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(StorageError::NotFound(swap.offer.trade_id.clone()));
        }
        Ok(())
    }

    async fn get(&self, trade_id: &TradeId) -> StorageResult<Option<ActiveSwap>> {
        let conn = self.conn()?;
        conn.query_row("SELECT record_json FROM swaps WHERE trade_id = ?1", params![trade_id], Self::row_to_swap)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StorageError::Database(other.to_string())),
            })
    }

    async fn get_by_phase(&self, phase: Phase) -> StorageResult<Vec<ActiveSwap>> {
        let conn = self.conn()?;
        let phase_str = format!("{:?}", phase);
        let mut stmt = conn
            .prepare("SELECT record_json FROM swaps WHERE phase = ?1")
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![phase_str], Self::row_to_swap)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>().map_err(|e| StorageError::Database(e.to_string()))
    }

    async fn get_active(&self) -> StorageResult<Vec<ActiveSwap>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT record_json FROM swaps WHERE phase NOT IN ('Completed', 'Refunded', 'Failed')")
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_swap)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>().map_err(|e| StorageError::Database(e.to_string()))
    }

    async fn delete(&self, trade_id: &TradeId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let rows = conn
            .execute("DELETE FROM swaps WHERE trade_id = ?1", params![trade_id])
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(rows > 0)
    }
}
