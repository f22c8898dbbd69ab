//! Swap Coordinator (spec.md §4.H)
//!
//! Orchestrates a swap end-to-end: negotiation, key/nonce exchange,
//! funding, signing, secret reveal, completion or refund. Owns one
//! `Arc<tokio::sync::Mutex<ActiveSwap>>` per trade — never a lock over the
//! whole swap table while doing chain I/O — with the top-level map behind
//! an `RwLock` for cheap concurrent lookups, mirroring the teacher's
//! `Arc<RwLock<_>>` service fields in `RedemptionService`.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::backend::{ChainBackend, LogEvent};
use crate::config::CoordinatorConfig;
use crate::events::{EventBus, SwapEvent};
use crate::evm::EvmHtlcError;
use crate::fees::FeeConfig;
use crate::htlc::HtlcError;
use crate::musig2_session::MuSig2Session;
use crate::persistence::{StorageError, SwapStore};
use crate::registry::ChainRegistry;
use crate::timeout::{saturating_height, TimeoutCalculator};

use super::types::{ActiveSwap, MethodSession, Offer, Phase, Role, SwapMethod, TradeId};

/// Coordinator errors.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("swap {0} was not found")]
    SwapNotFound(TradeId),

    #[error("swap {0} already exists")]
    SwapAlreadyExists(TradeId),

    #[error("cannot transition from {from:?} to {to:?}")]
    IllegalPhaseTransition { from: Phase, to: Phase },

    #[error("this swap does not have a {0:?} session")]
    WrongSessionKind(SwapMethod),

    #[error("chain backend is unavailable: {0}")]
    BackendUnavailable(String),

    #[error("chain backend returned an error: {0}")]
    BackendError(String),

    #[error("amount {amount} is outside the tradeable range [{min}, {max}] for {symbol}")]
    AmountOutOfRange { symbol: String, amount: u128, min: u128, max: u128 },

    #[error("operation was cancelled")]
    Cancelled,

    #[error("timelock has not matured: current height {current_height} is not past timeout {timeout_height}")]
    TimelockNotExpired { current_height: u64, timeout_height: u64 },

    #[error("current height {current_height} is within the safety margin ({safety_margin} blocks) of timeout {timeout_height}")]
    TooCloseToTimeout { current_height: u64, timeout_height: u64, safety_margin: u32 },

    #[error("invalid public key: {0}")]
    InvalidPubKey(String),
}

/// Where to send funds for a leg's `create_funding_tx` call: a UTXO chain
/// hands back an address the external wallet funds directly, an EVM chain
/// hands back the `createSwap` calldata to submit along with `amount` wei.
#[derive(Debug, Clone)]
pub enum FundingInstruction {
    Address(String),
    EvmCreateCalldata(Vec<u8>),
}

/// Everything the coordinator needs to drive swaps, injected once at
/// construction the way `CoordinatorConfig` is loaded once at startup.
pub struct SwapCoordinator {
    config: CoordinatorConfig,
    registry: ChainRegistry,
    timeouts: TimeoutCalculator,
    store: Arc<dyn SwapStore>,
    backends: HashMap<String, Arc<dyn ChainBackend>>,
    events: EventBus,
    active: RwLock<HashMap<TradeId, Arc<Mutex<ActiveSwap>>>>,
    cancellation: CancellationToken,
}

impl SwapCoordinator {
    pub fn new(config: CoordinatorConfig, registry: ChainRegistry, store: Arc<dyn SwapStore>, backends: HashMap<String, Arc<dyn ChainBackend>>) -> Self {
        Self {
            config,
            registry,
            timeouts: TimeoutCalculator::new(),
            store,
            backends,
            events: EventBus::default(),
            active: RwLock::new(HashMap::new()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn fees(&self) -> &FeeConfig {
        &self.config.fees
    }

    /// Cancel all in-flight chain I/O started through this coordinator
    /// (spec.md §5). Already-completed signing/persistence steps are not
    /// rolled back — this only stops further network calls.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    fn backend_for(&self, symbol: &str) -> Result<&Arc<dyn ChainBackend>, CoordinatorError> {
        self.backends.get(symbol).ok_or_else(|| CoordinatorError::BackendUnavailable(symbol.to_string()))
    }

    async fn get_active(&self, trade_id: &TradeId) -> Result<Arc<Mutex<ActiveSwap>>, CoordinatorError> {
        self.active
            .read()
            .await
            .get(trade_id)
            .cloned()
            .ok_or_else(|| CoordinatorError::SwapNotFound(trade_id.clone()))
    }

    /// Current tip height for `symbol`'s chain, retried with exponential
    /// backoff the same way [`Self::update_confirmations`] retries
    /// `confirmations` (spec.md §7).
    async fn current_height_for(&self, symbol: &str) -> Result<u64, CoordinatorError> {
        let backend = self.backend_for(symbol)?.clone();
        crate::retry::with_backoff(&self.cancellation, || {
            let backend = backend.clone();
            async move { backend.current_height().await }
        })
        .await
        .map_err(|e| CoordinatorError::BackendError(e.to_string()))
    }

    /// Minimum safety margin, in blocks, for `symbol`'s chain (spec.md
    /// §4.B), used to gate any operation that must complete strictly before
    /// a refund could instead be taken.
    fn safety_margin_blocks(&self, symbol: &str) -> Result<u32, CoordinatorError> {
        let params = self
            .registry
            .lookup(symbol, self.config.network)
            .map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
        Ok(self.timeouts.minimum_safety_margin_blocks(params.avg_block_seconds))
    }

    fn map_htlc_error(err: HtlcError) -> CoordinatorError {
        match err {
            HtlcError::TimelockNotExpired { current_height, timeout_height } => {
                CoordinatorError::TimelockNotExpired { current_height, timeout_height }
            }
            other => CoordinatorError::BackendError(other.to_string()),
        }
    }

    fn map_evm_error(err: EvmHtlcError) -> CoordinatorError {
        match err {
            EvmHtlcError::TimelockNotExpired { current_height, timeout_height } => {
                CoordinatorError::TimelockNotExpired { current_height, timeout_height }
            }
            other => CoordinatorError::BackendError(other.to_string()),
        }
    }

    /// Begin a new swap as the initiator: validate the offer against the
    /// chain registry, persist it, and register it in the active map.
    pub async fn initiate_swap(&self, offer: Offer, now: String) -> Result<(), CoordinatorError> {
        self.validate_offer(&offer)?;

        let swap = ActiveSwap::new(offer.clone(), now);
        self.store.insert(&swap).await.map_err(|e| match e {
            StorageError::Duplicate(id) => CoordinatorError::SwapAlreadyExists(id),
            other => CoordinatorError::BackendError(other.to_string()),
        })?;

        let mut active = self.active.write().await;
        if active.contains_key(&offer.trade_id) {
            return Err(CoordinatorError::SwapAlreadyExists(offer.trade_id));
        }
        active.insert(swap.offer.trade_id.clone(), Arc::new(Mutex::new(swap)));
        self.events.publish(SwapEvent::OfferReceived { trade_id: offer.trade_id });
        Ok(())
    }

    /// Accept a counterparty's offer as the responder, binding their MuSig2
    /// pubkey and the swap-wide secret hash commitment in the same step
    /// (spec.md §4.H). `remote_pubkey` must be 33 compressed SEC1 bytes
    /// on-curve, or this returns `InvalidPubKey` before anything is
    /// persisted.
    pub async fn respond_to_swap(
        &self,
        offer: Offer,
        remote_pubkey: [u8; 33],
        remote_secret_hash: [u8; 32],
        now: String,
    ) -> Result<(), CoordinatorError> {
        secp256k1::PublicKey::from_slice(&remote_pubkey).map_err(|e| CoordinatorError::InvalidPubKey(e.to_string()))?;

        let trade_id = offer.trade_id.clone();
        self.initiate_swap(offer, now).await?;
        self.commit_secret_hash(&trade_id, remote_secret_hash).await?;

        let swap_arc = self.get_active(&trade_id).await?;
        let mut swap = swap_arc.lock().await;
        swap.remote_pubkey = Some(remote_pubkey);
        Ok(())
    }

    fn validate_offer(&self, offer: &Offer) -> Result<(), CoordinatorError> {
        for (symbol, amount) in [(&offer.send_symbol, offer.send_amount), (&offer.receive_symbol, offer.receive_amount)] {
            let coin = self
                .registry
                .coin(symbol)
                .map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
            if amount < coin.min_amount || amount > coin.max_amount {
                return Err(CoordinatorError::AmountOutOfRange {
                    symbol: symbol.clone(),
                    amount,
                    min: coin.min_amount,
                    max: coin.max_amount,
                });
            }
        }
        Ok(())
    }

    /// Bind local session state for a leg and transition phase once both
    /// legs are keyed. Call once per leg (`symbol` identifies which).
    pub async fn generate_nonces(&self, trade_id: &TradeId, symbol: &str, now: String) -> Result<[u8; 66], CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;

        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let musig = session.as_musig2_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::MuSig2))?;

        let nonce = musig.generate_nonces().map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
        if swap.phase == Phase::KeysExchanged {
            swap.transition(Phase::NoncesExchanged, now)?;
        }

        self.events.publish(SwapEvent::NoncesExchanged { trade_id: trade_id.clone(), symbol: symbol.to_string() });
        Ok(nonce)
    }

    /// Bind the counterparty's nonce for `symbol`'s session.
    pub async fn set_remote_nonces(&self, trade_id: &TradeId, symbol: &str, remote_nonce: [u8; 66]) -> Result<(), CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;

        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let musig = session.as_musig2_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::MuSig2))?;
        musig.set_remote_nonce(remote_nonce);
        Ok(())
    }

    /// Mark a funding transaction seen for `symbol`, advancing to `Funded`
    /// once recorded. Retries the backend confirmation lookup with
    /// exponential backoff (spec.md §7), honoring cancellation.
    pub async fn update_confirmations(&self, trade_id: &TradeId, symbol: &str, txid: &str, now: String) -> Result<u32, CoordinatorError> {
        let backend = self.backend_for(symbol)?.clone();
        let confirmations = crate::retry::with_backoff(&self.cancellation, || {
            let backend = backend.clone();
            let txid = txid.to_string();
            async move { backend.confirmations(&txid).await }
        })
        .await
        .map_err(|e| CoordinatorError::BackendError(e.to_string()))?;

        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        swap.funding_txids.insert(txid.to_string());

        let params = self
            .registry
            .lookup(symbol, self.config.network)
            .map_err(|e| CoordinatorError::BackendError(e.to_string()))?;

        if confirmations >= params.required_confirmations {
            // Mark this leg's own session funded, independent of the
            // overall swap phase gate below — each leg reaches
            // `Funded`-at-the-session-level on its own schedule, since the
            // two chains confirm independently.
            if let Ok(session) = Self::session_for_symbol(&mut swap, symbol) {
                match session {
                    MethodSession::Htlc(htlc) if htlc.state() == crate::htlc::HtlcState::Created => {
                        let _ = htlc.mark_funded();
                    }
                    MethodSession::EvmHtlc(evm) if evm.state() == crate::evm::EvmHtlcState::Created => {
                        let _ = evm.mark_funded();
                    }
                    _ => {}
                }
            }

            if swap.phase == Phase::Funding {
                swap.transition(Phase::Funded, now)?;
                self.events.publish(SwapEvent::FundingSeen {
                    trade_id: trade_id.clone(),
                    symbol: symbol.to_string(),
                    txid: txid.to_string(),
                });
            }
        }

        Ok(confirmations)
    }

    /// Produce this party's partial signature over `sighash` for `symbol`'s
    /// MuSig2 session, transitioning into `Signing` on first call.
    pub async fn create_partial_signatures(&self, trade_id: &TradeId, symbol: &str, sighash: [u8; 32], now: String) -> Result<Vec<u8>, CoordinatorError> {
        let current_height = self.current_height_for(symbol).await?;
        let safety_margin = self.safety_margin_blocks(symbol)?;

        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;

        if let Some(timeout_height) = Self::session_for_symbol(&mut swap, symbol)?.timeout_height() {
            if !self
                .timeouts
                .is_safe_to_complete(saturating_height(current_height), saturating_height(timeout_height), safety_margin)
            {
                return Err(CoordinatorError::TooCloseToTimeout { current_height, timeout_height, safety_margin });
            }
        }

        if swap.phase == Phase::Funded {
            swap.transition(Phase::Signing, now)?;
        }

        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let musig = session.as_musig2_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::MuSig2))?;

        musig.init_signing_session().map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
        let partial = musig.sign(&sighash).map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
        Ok(partial.serialize().to_vec())
    }

    /// Combine local and remote partial signatures, transitioning to
    /// `Signed`.
    pub async fn combine_signatures(
        &self,
        trade_id: &TradeId,
        symbol: &str,
        local_partial: Vec<u8>,
        remote_partial: Vec<u8>,
        sighash: [u8; 32],
        now: String,
    ) -> Result<[u8; 64], CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;

        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let musig = session.as_musig2_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::MuSig2))?;

        let local = musig2::PartialSignature::from_slice(&local_partial).map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
        let remote = musig2::PartialSignature::from_slice(&remote_partial).map_err(|e| CoordinatorError::BackendError(e.to_string()))?;

        let signature = musig.combine(local, remote, &sighash).map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
        if swap.phase == Phase::Signing {
            swap.transition(Phase::Signed, now)?;
        }

        self.events.publish(SwapEvent::SignaturesCombined { trade_id: trade_id.clone(), symbol: symbol.to_string() });
        Ok(signature)
    }

    /// Record the revealed secret (this party learned it either by
    /// claiming, or by observing the counterparty's claim on chain) and
    /// transition to `SecretRevealed`.
    pub async fn reveal_secret(&self, trade_id: &TradeId, secret: [u8; 32], now: String) -> Result<(), CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;

        if let Some(expected_hash) = swap.secret_hash {
            if crate::secret::sha256(&secret) != expected_hash {
                return Err(CoordinatorError::BackendError("revealed secret does not match the committed hash".to_string()));
            }
        }

        swap.secret = Some(secret);
        swap.transition(Phase::SecretRevealed, now)?;
        self.events.publish(SwapEvent::SecretRevealed { trade_id: trade_id.clone() });
        Ok(())
    }

    /// Mark the swap fully completed once both legs have settled on
    /// chain.
    pub async fn complete_swap(&self, trade_id: &TradeId, now: String) -> Result<(), CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        swap.transition(Phase::Completed, now)?;
        self.store.update(&swap).await.map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
        self.events.publish(SwapEvent::SwapCompleted { trade_id: trade_id.clone() });
        Ok(())
    }

    /// Mark a leg refunded after its timelock matured without a
    /// cooperative claim. Refund is only ever valid strictly after timeout
    /// (spec.md §4.H/§7) — a leg with no recorded timelock (e.g. an adaptor
    /// leg, which borrows its counterparty's) skips the check rather than
    /// blocking the phase transition outright.
    pub async fn refund_swap(&self, trade_id: &TradeId, symbol: &str, now: String) -> Result<(), CoordinatorError> {
        let current_height = self.current_height_for(symbol).await?;

        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;

        if let Some(timeout_height) = Self::session_for_symbol(&mut swap, symbol)?.timeout_height() {
            if self
                .timeouts
                .is_safe_to_complete(saturating_height(current_height), saturating_height(timeout_height), 0)
            {
                return Err(CoordinatorError::TimelockNotExpired { current_height, timeout_height });
            }
        }

        swap.transition(Phase::Refunded, now)?;
        self.store.update(&swap).await.map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
        self.events.publish(SwapEvent::SwapRefunded { trade_id: trade_id.clone(), symbol: symbol.to_string() });
        Ok(())
    }

    /// Build the witness revealing `secret` for an HTLC leg's claim branch,
    /// transitioning that leg's session to `Claimed`.
    pub async fn build_htlc_claim_witness(&self, trade_id: &TradeId, symbol: &str, signature: &[u8], secret: &[u8; 32]) -> Result<Vec<Vec<u8>>, CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let htlc = session.as_htlc_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::Htlc))?;
        htlc.build_claim_witness(signature, secret).map_err(|e| CoordinatorError::BackendError(e.to_string()))
    }

    /// Build the timelocked refund witness for an HTLC leg, transitioning
    /// that leg's session to `Refunded`. Rejects with `TimelockNotExpired`
    /// unless the chain's current height is strictly past the leg's
    /// timelock (spec.md §4.H/§7).
    pub async fn build_htlc_refund_witness(&self, trade_id: &TradeId, symbol: &str, signature: &[u8]) -> Result<Vec<Vec<u8>>, CoordinatorError> {
        let current_height = self.current_height_for(symbol).await?;
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let htlc = session.as_htlc_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::Htlc))?;
        htlc.build_refund_witness(signature, current_height).map_err(Self::map_htlc_error)
    }

    /// Encode a `refund` call for an EVM HTLC leg, transitioning that leg's
    /// session to `Refunded`. Same timelock gate as
    /// [`Self::build_htlc_refund_witness`], applied to the EVM leg (the
    /// review gap: `EvmHtlcSession::encode_refund` previously had no
    /// coordinator-level caller at all).
    pub async fn refund_evm_htlc(&self, trade_id: &TradeId, symbol: &str) -> Result<Vec<u8>, CoordinatorError> {
        let current_height = self.current_height_for(symbol).await?;
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let evm = session.as_evm_htlc_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::EvmHtlc))?;
        evm.encode_refund(current_height).map_err(Self::map_evm_error)
    }

    /// Extract and validate the preimage revealed in a counterparty's HTLC
    /// claim witness, against `symbol`'s own secret hash commitment.
    pub async fn extract_secret_from_htlc_claim(&self, trade_id: &TradeId, symbol: &str, witness_items: &[Vec<u8>]) -> Result<[u8; 32], CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let htlc = session.as_htlc_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::Htlc))?;
        crate::secret::extract_from_htlc_witness(witness_items, &htlc.secret_hash).map_err(|e| CoordinatorError::BackendError(e.to_string()))
    }

    /// Encode a `claim` call for `symbol`'s EVM HTLC leg with the revealed
    /// secret, transitioning that leg's session to `Claimed`. Matches
    /// spec.md §8's "observe the counterparty's claim, then claim on the
    /// other chain" flow (S4).
    pub async fn claim_evm_htlc(&self, trade_id: &TradeId, symbol: &str, secret: [u8; 32]) -> Result<Vec<u8>, CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        let session = Self::session_for_symbol(&mut swap, symbol)?;
        let evm = session.as_evm_htlc_mut().ok_or(CoordinatorError::WrongSessionKind(SwapMethod::EvmHtlc))?;
        evm.encode_claim(secret).map_err(|e| CoordinatorError::BackendError(e.to_string()))
    }

    /// Produce the funding instruction for `symbol`'s leg, gated on still
    /// being safely before the safety margin (spec.md §4.H: "safe-to-
    /// complete on this chain") — there is no point funding a leg that
    /// cannot complete before its own timelock matures.
    pub async fn create_funding_tx(&self, trade_id: &TradeId, symbol: &str) -> Result<FundingInstruction, CoordinatorError> {
        let current_height = self.current_height_for(symbol).await?;
        let safety_margin = self.safety_margin_blocks(symbol)?;

        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        let session = Self::session_for_symbol(&mut swap, symbol)?;

        if let Some(timeout_height) = session.timeout_height() {
            if !self
                .timeouts
                .is_safe_to_complete(saturating_height(current_height), saturating_height(timeout_height), safety_margin)
            {
                return Err(CoordinatorError::TooCloseToTimeout { current_height, timeout_height, safety_margin });
            }
        }

        match session {
            MethodSession::Htlc(htlc) => {
                let network = self.config.network.bitcoin_network();
                let address = htlc.funding_address(network).map_err(|e| CoordinatorError::BackendError(e.to_string()))?;
                Ok(FundingInstruction::Address(address.to_string()))
            }
            MethodSession::MuSig2(musig) => {
                let network = self.config.network.bitcoin_network();
                let address = musig
                    .funding_address(network)
                    .ok_or_else(|| CoordinatorError::BackendError("taproot script tree not built yet".to_string()))?;
                Ok(FundingInstruction::Address(address.to_string()))
            }
            MethodSession::EvmHtlc(evm) => Ok(FundingInstruction::EvmCreateCalldata(evm.encode_create())),
            MethodSession::Adaptor(_) => Err(CoordinatorError::WrongSessionKind(SwapMethod::Adaptor)),
        }
    }

    /// Submit an EVM `createSwap` call for a native-asset leg, gated the
    /// same way as [`Self::create_funding_tx`]. Thin wrapper kept separate
    /// from the ERC-20 variant (spec.md §4.G) even though both currently
    /// produce the same calldata, since the two differ in which token
    /// address the session was constructed with.
    pub async fn create_swap_native(&self, trade_id: &TradeId, symbol: &str) -> Result<Vec<u8>, CoordinatorError> {
        self.create_evm_swap(trade_id, symbol).await
    }

    /// Submit an EVM `createSwap` call for an ERC-20 leg.
    pub async fn create_swap_erc20(&self, trade_id: &TradeId, symbol: &str) -> Result<Vec<u8>, CoordinatorError> {
        self.create_evm_swap(trade_id, symbol).await
    }

    async fn create_evm_swap(&self, trade_id: &TradeId, symbol: &str) -> Result<Vec<u8>, CoordinatorError> {
        match self.create_funding_tx(trade_id, symbol).await? {
            FundingInstruction::EvmCreateCalldata(calldata) => Ok(calldata),
            FundingInstruction::Address(_) => Err(CoordinatorError::WrongSessionKind(SwapMethod::EvmHtlc)),
        }
    }

    /// Watch `symbol`'s EVM contract for a `SwapClaimed` event and return
    /// the revealed secret (spec.md §4.G). Polls `logs_since` with
    /// exponential backoff starting from the swap's funding height, taking
    /// the first decodable match — per-swap filtering at the event-id level
    /// is the embedding `ChainBackend`'s job, the same way it already scopes
    /// `logs_since` to one contract address.
    pub async fn wait_for_secret(
        &self,
        trade_id: &TradeId,
        symbol: &str,
        contract_address: &str,
        from_height: u64,
        now: String,
    ) -> Result<[u8; 32], CoordinatorError> {
        let backend = self.backend_for(symbol)?.clone();
        let logs = crate::retry::with_backoff(&self.cancellation, || {
            let backend = backend.clone();
            async move { backend.logs_since(contract_address, from_height).await }
        })
        .await
        .map_err(|e| CoordinatorError::BackendError(e.to_string()))?;

        let secret = logs
            .iter()
            .find(|log: &&LogEvent| log.event_name == "SwapClaimed")
            .and_then(|log| crate::evm::abi::decode_swap_claimed_secret(&log.data))
            .ok_or_else(|| CoordinatorError::BackendError("no SwapClaimed log observed yet".to_string()))?;

        self.reveal_secret(trade_id, secret, now).await?;
        Ok(secret)
    }

    fn session_for_symbol<'a>(swap: &'a mut ActiveSwap, symbol: &str) -> Result<&'a mut MethodSession, CoordinatorError> {
        if swap.offer.send_symbol == symbol {
            swap.send_session.as_mut().ok_or(CoordinatorError::SwapNotFound(swap.offer.trade_id.clone()))
        } else if swap.offer.receive_symbol == symbol {
            swap.receive_session.as_mut().ok_or(CoordinatorError::SwapNotFound(swap.offer.trade_id.clone()))
        } else {
            Err(CoordinatorError::BackendUnavailable(symbol.to_string()))
        }
    }

    /// Attach a freshly constructed MuSig2 session for `symbol`. Thin
    /// wrapper over [`Self::attach_session`] kept for call sites that only
    /// ever deal in MuSig2 legs.
    pub async fn attach_musig2_session(&self, trade_id: &TradeId, symbol: &str, session: MuSig2Session, now: String) -> Result<(), CoordinatorError> {
        self.attach_session(trade_id, symbol, MethodSession::MuSig2(session), now).await
    }

    /// Attach a freshly constructed session of any [`SwapMethod`] for
    /// `symbol` to a swap already in `Negotiating`, transitioning into
    /// `KeysExchanged` once both legs are attached. A non-MuSig2 leg (HTLC,
    /// adaptor, EVM HTLC) has no key/nonce exchange of its own, so this is
    /// also the only bookkeeping step that leg needs before `Funding`.
    pub async fn attach_session(&self, trade_id: &TradeId, symbol: &str, session: MethodSession, now: String) -> Result<(), CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;

        if swap.offer.send_symbol == symbol {
            swap.send_session = Some(session);
        } else if swap.offer.receive_symbol == symbol {
            swap.receive_session = Some(session);
        } else {
            return Err(CoordinatorError::BackendUnavailable(symbol.to_string()));
        }

        if swap.send_session.is_some() && swap.receive_session.is_some() && swap.phase == Phase::Negotiating {
            swap.transition(Phase::KeysExchanged, now)?;
        }
        Ok(())
    }

    /// Drive a non-MuSig2 leg straight from `KeysExchanged` to
    /// `NoncesExchanged` — there is no nonce exchange for an HTLC/adaptor/
    /// EVM-HTLC leg, but the phase machine still gates `Funding` on having
    /// passed through it, so this is the generalization of
    /// [`Self::generate_nonces`] for those methods.
    pub async fn acknowledge_no_nonce_exchange(&self, trade_id: &TradeId, now: String) -> Result<(), CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        if swap.phase == Phase::KeysExchanged {
            swap.transition(Phase::NoncesExchanged, now)?;
        }
        Ok(())
    }

    pub async fn begin_funding(&self, trade_id: &TradeId, now: String) -> Result<(), CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        swap.transition(Phase::Funding, now)?;
        Ok(())
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// Commit the swap-wide secret hash, so a later `reveal_secret` is
    /// checked against it rather than accepted unconditionally. A no-op if
    /// already committed to the same hash; errors if it would change.
    pub async fn commit_secret_hash(&self, trade_id: &TradeId, secret_hash: [u8; 32]) -> Result<(), CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let mut swap = swap_arc.lock().await;
        match swap.secret_hash {
            Some(existing) if existing != secret_hash => {
                Err(CoordinatorError::BackendError("secret hash commitment cannot change once set".to_string()))
            }
            _ => {
                swap.secret_hash = Some(secret_hash);
                Ok(())
            }
        }
    }

    /// The current phase of a tracked swap.
    pub async fn phase_of(&self, trade_id: &TradeId) -> Result<Phase, CoordinatorError> {
        let swap_arc = self.get_active(trade_id).await?;
        let swap = swap_arc.lock().await;
        Ok(swap.phase)
    }
}
