//! In-memory [`SwapStore`], used in tests and the end-to-end scenarios.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::coordinator::types::{ActiveSwap, Phase, TradeId};

use super::{StorageError, StorageResult, SwapStore};

#[derive(Default)]
pub struct InMemorySwapStore {
    swaps: RwLock<HashMap<TradeId, ActiveSwap>>,
}

impl InMemorySwapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SwapStore for InMemorySwapStore {
    async fn insert(&self, swap: &ActiveSwap) -> StorageResult<()> {
        let mut swaps = self.swaps.write().unwrap();
        if swaps.contains_key(&swap.offer.trade_id) {
            return Err(StorageError::Duplicate(swap.offer.trade_id.clone()));
        }
        swaps.insert(swap.offer.trade_id.clone(), swap.clone());
        Ok(())
    }

    async fn update(&self, swap: &ActiveSwap) -> StorageResult<()> {
        let mut swaps = self.swaps.write().unwrap();
        if !swaps.contains_key(&swap.offer.trade_id) {
            return Err(StorageError::NotFound(swap.offer.trade_id.clone()));
        }
        swaps.insert(swap.offer.trade_id.clone(), swap.clone());
        Ok(())
    }

    async fn get(&self, trade_id: &TradeId) -> StorageResult<Option<ActiveSwap>> {
        Ok(self.swaps.read().unwrap().get(trade_id).cloned())
    }

    async fn get_by_phase(&self, phase: Phase) -> StorageResult<Vec<ActiveSwap>> {
        Ok(self
            .swaps
            .read()
            .unwrap()
            .values()
            .filter(|s| s.phase == phase)
            .cloned()
            .collect())
    }

    async fn get_active(&self) -> StorageResult<Vec<ActiveSwap>> {
        Ok(self
            .swaps
            .read()
            .unwrap()
            .values()
            .filter(|s| !s.phase.is_terminal())
            .cloned()
            .collect())
    }

    async fn delete(&self, trade_id: &TradeId) -> StorageResult<bool> {
        Ok(self.swaps.write().unwrap().remove(trade_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::types::{Offer, Role, SwapMethod};

    fn sample_swap(trade_id: &str) -> ActiveSwap {
        ActiveSwap::new(
            Offer {
                trade_id: trade_id.to_string(),
                send_symbol: "BTC".to_string(),
                send_amount: 100_000,
                receive_symbol: "ETH".to_string(),
                receive_amount: 1_000_000_000_000_000_000,
                method: SwapMethod::MuSig2,
                role: Role::Initiator,
            },
            "2026-01-01T00:00:00Z".to_string(),
        )
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = InMemorySwapStore::new();
        let swap = sample_swap("t1");
        store.insert(&swap).await.unwrap();

        let fetched = store.get(&"t1".to_string()).await.unwrap().unwrap();
        assert_eq!(fetched.offer.trade_id, "t1");
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemorySwapStore::new();
        let swap = sample_swap("t1");
        store.insert(&swap).await.unwrap();
        let err = store.insert(&swap).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(_)));
    }

    #[tokio::test]
    async fn get_active_excludes_terminal_phases() {
        let store = InMemorySwapStore::new();
        let mut completed = sample_swap("t2");
        completed.phase = crate::coordinator::types::Phase::Completed;
        store.insert(&completed).await.unwrap();
        store.insert(&sample_swap("t3")).await.unwrap();

        let active = store.get_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].offer.trade_id, "t3");
    }
}
