//! S6: many swaps in flight on disjoint trade ids concurrently exercise the
//! shared coordinator — no deadlock, no cross-swap leakage, each reaches
//! `Funded` independently of the others' progress.

use std::collections::HashMap;
use std::sync::Arc;

use swap_coordinator::backend::MockChainBackend;
use swap_coordinator::config::CoordinatorConfig;
use swap_coordinator::coordinator::{MethodSession, Offer, Phase, Role, SwapCoordinator, SwapMethod};
use swap_coordinator::htlc::HtlcSession;
use swap_coordinator::persistence::memory::InMemorySwapStore;
use swap_coordinator::registry::ChainRegistryBuilder;

const SWAP_COUNT: usize = 100;

fn confirmed_backend() -> Arc<dyn swap_coordinator::backend::ChainBackend> {
    let mut mock = MockChainBackend::new();
    mock.expect_confirmations().returning(|_| Ok(6));
    Arc::new(mock)
}

#[tokio::test]
async fn s6_one_hundred_concurrent_swaps_complete_independently() {
    let mut backends: HashMap<String, Arc<dyn swap_coordinator::backend::ChainBackend>> = HashMap::new();
    backends.insert("LTC".to_string(), confirmed_backend());
    backends.insert("DOGE".to_string(), confirmed_backend());

    let coordinator = Arc::new(SwapCoordinator::new(
        CoordinatorConfig::for_tests(),
        ChainRegistryBuilder::for_tests(),
        Arc::new(InMemorySwapStore::new()),
        backends,
    ));

    let mut handles = Vec::with_capacity(SWAP_COUNT);
    for i in 0..SWAP_COUNT {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            let trade_id = format!("s6-trade-{i}");
            let now = "2026-07-27T00:00:00Z".to_string();

            let offer = Offer {
                trade_id: trade_id.clone(),
                send_symbol: "LTC".to_string(),
                send_amount: 100_000 + i as u64,
                receive_symbol: "DOGE".to_string(),
                receive_amount: 400_000 + i as u64,
                method: SwapMethod::Htlc,
                role: Role::Initiator,
            };
            coordinator.initiate_swap(offer, now.clone()).await.unwrap();

            let (_secret, secret_hash) = swap_coordinator::secret::generate();
            let claim_pubkey = [0x02u8; 33];
            let refund_pubkey = [0x03u8; 33];
            let ltc_htlc = HtlcSession::new(secret_hash, claim_pubkey, refund_pubkey, 288);
            let doge_htlc = HtlcSession::new(secret_hash, claim_pubkey, refund_pubkey, 144);

            coordinator.attach_session(&trade_id, "LTC", MethodSession::Htlc(ltc_htlc), now.clone()).await.unwrap();
            coordinator.attach_session(&trade_id, "DOGE", MethodSession::Htlc(doge_htlc), now.clone()).await.unwrap();
            coordinator.acknowledge_no_nonce_exchange(&trade_id, now.clone()).await.unwrap();

            coordinator.begin_funding(&trade_id, now.clone()).await.unwrap();
            coordinator.update_confirmations(&trade_id, "LTC", "ltc-tx", now.clone()).await.unwrap();
            coordinator.update_confirmations(&trade_id, "DOGE", "doge-tx", now.clone()).await.unwrap();

            let phase = coordinator.phase_of(&trade_id).await.unwrap();
            (trade_id, secret_hash, phase)
        }));
    }

    let mut seen_hashes = std::collections::HashSet::new();
    for handle in handles {
        let (trade_id, secret_hash, phase) = handle.await.expect("swap task panicked");
        assert_eq!(phase, Phase::Funded, "swap {trade_id} did not reach Funded");
        assert!(seen_hashes.insert(secret_hash), "secret hash collision for {trade_id}");
    }

    // Every trade id is independently resolvable after the fact.
    for i in 0..SWAP_COUNT {
        let trade_id = format!("s6-trade-{i}");
        assert_eq!(coordinator.phase_of(&trade_id).await.unwrap(), Phase::Funded);
    }
}

#[tokio::test]
async fn s6_duplicate_trade_id_among_concurrent_initiations_is_rejected_exactly_once() {
    let backends: HashMap<String, Arc<dyn swap_coordinator::backend::ChainBackend>> = HashMap::new();
    let coordinator = Arc::new(SwapCoordinator::new(
        CoordinatorConfig::for_tests(),
        ChainRegistryBuilder::for_tests(),
        Arc::new(InMemorySwapStore::new()),
        backends,
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            let offer = Offer {
                trade_id: "s6-dup".to_string(),
                send_symbol: "LTC".to_string(),
                send_amount: 100_000,
                receive_symbol: "DOGE".to_string(),
                receive_amount: 400_000,
                method: SwapMethod::Htlc,
                role: Role::Initiator,
            };
            coordinator.initiate_swap(offer, "2026-07-27T00:00:00Z".to_string()).await
        }));
    }

    let mut ok_count = 0;
    let mut err_count = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(()) => ok_count += 1,
            Err(_) => err_count += 1,
        }
    }
    assert_eq!(ok_count, 1, "exactly one concurrent initiation should win the trade id");
    assert_eq!(err_count, 7);
}
