//! S3: a non-taproot HTLC leg whose counterparty went offline is refunded
//! via the script-path timeout, once its timelock has matured.

use std::collections::HashMap;
use std::sync::Arc;

use swap_coordinator::backend::MockChainBackend;
use swap_coordinator::config::CoordinatorConfig;
use swap_coordinator::coordinator::{MethodSession, Offer, Phase, Role, SwapCoordinator, SwapMethod};
use swap_coordinator::htlc::HtlcSession;
use swap_coordinator::persistence::memory::InMemorySwapStore;
use swap_coordinator::registry::ChainRegistryBuilder;
use swap_coordinator::timeout::TimeoutCalculator;

fn backend_reporting(confirmations: u32, current_height: u64) -> Arc<dyn swap_coordinator::backend::ChainBackend> {
    let mut mock = MockChainBackend::new();
    mock.expect_confirmations().returning(move |_| Ok(confirmations));
    mock.expect_current_height().returning(move || Ok(current_height));
    Arc::new(mock)
}

#[tokio::test]
async fn s3_responder_offline_initiator_refunds_after_timeout() {
    let mut backends: HashMap<String, Arc<dyn swap_coordinator::backend::ChainBackend>> = HashMap::new();
    backends.insert("DOGE".to_string(), backend_reporting(6, 50));
    backends.insert("LTC".to_string(), backend_reporting(1, 300));

    let coordinator = SwapCoordinator::new(
        CoordinatorConfig::for_tests(),
        ChainRegistryBuilder::for_tests(),
        Arc::new(InMemorySwapStore::new()),
        backends,
    );

    let offer = Offer {
        trade_id: "s3-trade".to_string(),
        send_symbol: "LTC".to_string(),
        send_amount: 500_000,
        receive_symbol: "DOGE".to_string(),
        receive_amount: 2_000_000,
        method: SwapMethod::Htlc,
        role: Role::Initiator,
    };
    let trade_id = offer.trade_id.clone();
    let now = "2026-07-27T00:00:00Z".to_string();
    coordinator.initiate_swap(offer, now.clone()).await.unwrap();

    let (secret, secret_hash) = swap_coordinator::secret::generate();
    let claim_pubkey = [0x02u8; 33];
    let refund_pubkey = [0x03u8; 33];
    let initiator_htlc = HtlcSession::new(secret_hash, claim_pubkey, refund_pubkey, 288);
    let responder_htlc = HtlcSession::new(secret_hash, claim_pubkey, refund_pubkey, 144);

    coordinator
        .attach_session(&trade_id, "LTC", MethodSession::Htlc(initiator_htlc), now.clone())
        .await
        .unwrap();
    coordinator
        .attach_session(&trade_id, "DOGE", MethodSession::Htlc(responder_htlc), now.clone())
        .await
        .unwrap();
    assert_eq!(coordinator.phase_of(&trade_id).await.unwrap(), Phase::KeysExchanged);

    coordinator.acknowledge_no_nonce_exchange(&trade_id, now.clone()).await.unwrap();
    assert_eq!(coordinator.phase_of(&trade_id).await.unwrap(), Phase::NoncesExchanged);

    coordinator.begin_funding(&trade_id, now.clone()).await.unwrap();
    coordinator.update_confirmations(&trade_id, "LTC", "ltc-funding-tx", now.clone()).await.unwrap();
    coordinator.update_confirmations(&trade_id, "DOGE", "doge-funding-tx", now.clone()).await.unwrap();
    assert_eq!(coordinator.phase_of(&trade_id).await.unwrap(), Phase::Funded);

    // The responder funded DOGE, then went offline without revealing the
    // secret. The initiator's own LTC timelock (288 blocks) is what
    // eventually matures and lets them refund their side — the mock LTC
    // backend reports height 300, strictly past it.
    let refund_witness = coordinator.build_htlc_refund_witness(&trade_id, "LTC", &[0xAB; 64]).await.unwrap();
    assert_eq!(refund_witness.len(), 3);
    assert!(refund_witness[1].is_empty(), "empty vector must select the OP_ELSE refund branch");

    coordinator.refund_swap(&trade_id, "LTC", now.clone()).await.unwrap();
    assert_eq!(coordinator.phase_of(&trade_id).await.unwrap(), Phase::Refunded);

    // The secret was never revealed on chain, so it's still useless to
    // anyone watching.
    let _ = secret;
}

#[tokio::test]
async fn s3_refund_before_timeout_is_rejected() {
    let mut backends: HashMap<String, Arc<dyn swap_coordinator::backend::ChainBackend>> = HashMap::new();
    backends.insert("DOGE".to_string(), backend_reporting(6, 50));
    // Current height (10) is nowhere near the LTC leg's 288-block timelock.
    backends.insert("LTC".to_string(), backend_reporting(1, 10));

    let coordinator = SwapCoordinator::new(
        CoordinatorConfig::for_tests(),
        ChainRegistryBuilder::for_tests(),
        Arc::new(InMemorySwapStore::new()),
        backends,
    );

    let offer = Offer {
        trade_id: "s3-too-early".to_string(),
        send_symbol: "LTC".to_string(),
        send_amount: 500_000,
        receive_symbol: "DOGE".to_string(),
        receive_amount: 2_000_000,
        method: SwapMethod::Htlc,
        role: Role::Initiator,
    };
    let trade_id = offer.trade_id.clone();
    let now = "2026-07-27T00:00:00Z".to_string();
    coordinator.initiate_swap(offer, now.clone()).await.unwrap();

    let (_secret, secret_hash) = swap_coordinator::secret::generate();
    let claim_pubkey = [0x02u8; 33];
    let refund_pubkey = [0x03u8; 33];
    let initiator_htlc = HtlcSession::new(secret_hash, claim_pubkey, refund_pubkey, 288);
    let responder_htlc = HtlcSession::new(secret_hash, claim_pubkey, refund_pubkey, 144);

    coordinator.attach_session(&trade_id, "LTC", MethodSession::Htlc(initiator_htlc), now.clone()).await.unwrap();
    coordinator.attach_session(&trade_id, "DOGE", MethodSession::Htlc(responder_htlc), now.clone()).await.unwrap();
    coordinator.acknowledge_no_nonce_exchange(&trade_id, now.clone()).await.unwrap();
    coordinator.begin_funding(&trade_id, now.clone()).await.unwrap();
    coordinator.update_confirmations(&trade_id, "LTC", "ltc-funding-tx", now.clone()).await.unwrap();
    coordinator.update_confirmations(&trade_id, "DOGE", "doge-funding-tx", now.clone()).await.unwrap();
    assert_eq!(coordinator.phase_of(&trade_id).await.unwrap(), Phase::Funded);

    let calc = TimeoutCalculator::new();
    assert!(calc.is_safe_to_complete(10, 288, 0), "sanity check: 10 is nowhere near 288");

    let witness_err = coordinator.build_htlc_refund_witness(&trade_id, "LTC", &[0xAB; 64]).await.unwrap_err();
    assert!(matches!(witness_err, swap_coordinator::coordinator::CoordinatorError::TimelockNotExpired { .. }));

    let refund_err = coordinator.refund_swap(&trade_id, "LTC", now.clone()).await.unwrap_err();
    assert!(matches!(refund_err, swap_coordinator::coordinator::CoordinatorError::TimelockNotExpired { .. }));
    assert_eq!(coordinator.phase_of(&trade_id).await.unwrap(), Phase::Funded, "a rejected refund must not move the swap phase");
}
