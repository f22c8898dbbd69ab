//! MuSig2 Session (spec.md §4.D) — the hardest subcomponent.
//!
//! Two-party MuSig2 over secp256k1 for BIP-340 Schnorr signatures over a
//! Taproot output. Built on the `musig2` crate's `KeyAggContext`/nonce
//! types, converting to/from `bitcoin`-crate point types only at the
//! taproot-address boundary (see [`crate::taproot`]).
//!
//! # Nonce-reuse safety
//!
//! If the same nonce signs two different messages the private key is
//! recoverable from two equations in two unknowns. Every nonce this session
//! has ever used — including across restarts, once rehydrated from
//! persistence — lives in `used_nonces` and is refused for signing again.
//! [`MuSig2Session::sign`] is the single most safety-critical function in
//! this crate: it must set both `nonce_used` and `invalidated` *before*
//! returning success, and insert the nonce into the used set in the same
//! step, so no interleaving of two callers (or a crash between "signed" and
//! "recorded") can leave the session able to sign twice with one nonce.

use std::collections::BTreeSet;

use bitcoin::XOnlyPublicKey;
use musig2::secp256k1::{PublicKey as MusigPublicKey, SecretKey as MusigSecretKey};
use musig2::{AggNonce, KeyAggContext, PartialSignature, PubNonce, SecNonce, SecNonceBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Network;
use crate::taproot::TaprootScriptTree;

/// MuSig2 / taproot-signing errors.
#[derive(Debug, Error)]
pub enum MuSigError {
    #[error("chain does not support taproot")]
    TaprootNotSupported,

    #[error("remote public key has not been set")]
    MissingRemotePubkey,

    #[error("remote nonce has not been set")]
    MissingRemoteNonce,

    #[error("key aggregation failed: {0}")]
    KeyAggregationFailed(String),

    #[error("nonce has already been used for a prior signature")]
    NonceAlreadyUsed,

    #[error("nonce reuse detected across sessions sharing this key")]
    NonceReuseDetected,

    #[error("session has been invalidated and must call reset_for_new_sign")]
    SessionInvalidated,

    #[error("sighash must be exactly 32 bytes")]
    InvalidSighashLength,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("combined signature failed verification against the tweaked key")]
    SignatureVerificationFailed,

    #[error("nonce generation collided with a previously used nonce")]
    NonceCollision,
}

/// Explicit session states, replacing the two boolean flags the upstream
/// design used (spec.md §9 REDESIGN FLAGS): a session cannot be
/// "not invalidated" yet carry a used nonce, because that combination is
/// simply not a reachable state in this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Fresh,
    NoncesGenerated,
    Signed,
    Invalidated,
}

/// Per-chain MuSig2 session. Owned exclusively by the `ActiveSwap` it
/// belongs to (spec.md §5: "MuSig2 sessions are not shared").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuSig2Session {
    pub symbol: String,
    pub network: Network,

    local_priv_key: [u8; 32],
    local_pub_key: [u8; 33],
    remote_pub_key: Option<[u8; 33]>,

    #[serde(skip)]
    key_agg_ctx: Option<KeyAggContext>,
    aggregated_pubkey: Option<[u8; 32]>,
    script_tree: Option<TaprootScriptTree>,

    #[serde(skip)]
    local_sec_nonce: Option<SecNonce>,
    local_pub_nonce: Option<[u8; 66]>,
    remote_pub_nonce: Option<[u8; 66]>,

    phase: SessionPhase,
    used_nonces: BTreeSet<[u8; 66]>,
}

impl MuSig2Session {
    /// Create a new session for `symbol` on `network`. Rejects chains
    /// without taproot support — the caller is expected to have already
    /// resolved `taproot_supported` via [`crate::registry::ChainRegistry`].
    pub fn new(symbol: impl Into<String>, network: Network, taproot_supported: bool, local_priv_key: [u8; 32]) -> Result<Self, MuSigError> {
        if !taproot_supported {
            return Err(MuSigError::TaprootNotSupported);
        }

        let secret_key = MusigSecretKey::from_slice(&local_priv_key)
            .map_err(|e| MuSigError::KeyAggregationFailed(e.to_string()))?;
        let local_pub_key = MusigPublicKey::from_secret_key_global(&secret_key);

        Ok(Self {
            symbol: symbol.into(),
            network,
            local_priv_key,
            local_pub_key: local_pub_key.serialize(),
            remote_pub_key: None,
            key_agg_ctx: None,
            aggregated_pubkey: None,
            script_tree: None,
            local_sec_nonce: None,
            local_pub_nonce: None,
            remote_pub_nonce: None,
            phase: SessionPhase::Fresh,
            used_nonces: BTreeSet::new(),
        })
    }

    pub fn local_pub_key(&self) -> [u8; 33] {
        self.local_pub_key
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// `true` once `sign` has consumed the current nonce.
    pub fn nonce_used(&self) -> bool {
        matches!(self.phase, SessionPhase::Signed | SessionPhase::Invalidated)
    }

    /// `true` once the session must not sign again without `reset_for_new_sign`.
    pub fn invalidated(&self) -> bool {
        matches!(self.phase, SessionPhase::Invalidated)
    }

    pub fn used_nonces(&self) -> &BTreeSet<[u8; 66]> {
        &self.used_nonces
    }

    /// The refund leg's relative-blocks timelock, once
    /// `taproot_address_with_refund` has built the script tree.
    pub fn refund_timeout_blocks(&self) -> Option<u32> {
        self.script_tree.as_ref().map(TaprootScriptTree::timeout_blocks)
    }

    /// The funding address for this leg's taproot output, once
    /// `taproot_address_with_refund` has built the script tree.
    pub fn funding_address(&self, network: bitcoin::Network) -> Option<bitcoin::Address> {
        self.script_tree.as_ref().map(|tree| tree.address(network))
    }

    /// Bind the counterparty's public key and perform key aggregation.
    ///
    /// Both 33-byte compressed keys are sorted lexicographically before
    /// aggregation so both parties compute an identical aggregate
    /// regardless of who calls `set_remote_pubkey` "first" locally.
    pub fn set_remote_pubkey(&mut self, remote_pub_key: [u8; 33]) -> Result<(), MuSigError> {
        self.remote_pub_key = Some(remote_pub_key);

        let mut keys = [self.local_pub_key, remote_pub_key];
        keys.sort();

        let parsed: Result<Vec<MusigPublicKey>, _> = keys.iter().map(|k| MusigPublicKey::from_slice(k)).collect();
        let parsed = parsed.map_err(|e| MuSigError::KeyAggregationFailed(e.to_string()))?;

        let ctx = KeyAggContext::new(parsed).map_err(|e| MuSigError::KeyAggregationFailed(e.to_string()))?;
        let agg_point: MusigPublicKey = ctx.aggregated_pubkey();
        let (xonly, _parity) = agg_point.x_only_public_key();

        self.aggregated_pubkey = Some(xonly.serialize());
        self.key_agg_ctx = Some(ctx);
        Ok(())
    }

    /// The aggregated x-only public key, before any taproot tweak.
    pub fn aggregated_pubkey(&self) -> Result<[u8; 32], MuSigError> {
        self.aggregated_pubkey.ok_or(MuSigError::MissingRemotePubkey)
    }

    /// Stable swap identifier: first 16 bytes of
    /// `SHA-256(min(pk_a, pk_b) || max(pk_a, pk_b))`. Commutative in the two
    /// keys by construction (spec.md §8 property 5).
    pub fn compute_swap_id(pk_a: [u8; 33], pk_b: [u8; 33]) -> [u8; 16] {
        let (lo, hi) = if pk_a <= pk_b { (pk_a, pk_b) } else { (pk_b, pk_a) };
        let mut buf = Vec::with_capacity(66);
        buf.extend_from_slice(&lo);
        buf.extend_from_slice(&hi);
        let hash = crate::secret::sha256(&buf);
        let mut id = [0u8; 16];
        id.copy_from_slice(&hash[..16]);
        id
    }

    /// Build the taproot address with a cooperative key path and a
    /// timelocked refund script path, binding the session's script tree for
    /// the subsequent taproot tweak.
    pub fn taproot_address_with_refund(&mut self, refund_pubkey: [u8; 32], timeout_blocks: u32) -> Result<bitcoin::Address, MuSigError> {
        let internal_key = XOnlyPublicKey::from_slice(&self.aggregated_pubkey()?)
            .map_err(|e| MuSigError::KeyAggregationFailed(e.to_string()))?;

        let tree = TaprootScriptTree::build(internal_key, refund_pubkey, timeout_blocks)
            .map_err(|e| MuSigError::KeyAggregationFailed(e.to_string()))?;

        let address = tree.address(self.network.bitcoin_network());
        self.script_tree = Some(tree);
        Ok(address)
    }

    /// Generate fresh public nonces for this chain's sighash.
    ///
    /// Any prior nonce is moved into `used_nonces` before a new one is
    /// drawn, and `phase` resets to `NoncesGenerated` — this is the only
    /// function that advances a session out of `Invalidated` back toward
    /// being signable, matching the "only legal path to signing again"
    /// rule in spec.md §4.D (alongside [`Self::reset_for_new_sign`], which
    /// calls this internally).
    pub fn generate_nonces(&mut self) -> Result<[u8; 66], MuSigError> {
        if let Some(prior) = self.local_pub_nonce.take() {
            self.used_nonces.insert(prior);
        }

        let secret_key = MusigSecretKey::from_slice(&self.local_priv_key)
            .map_err(|e| MuSigError::KeyAggregationFailed(e.to_string()))?;

        let sec_nonce: SecNonce = SecNonceBuilder::new(rand::rngs::OsRng)
            .with_seckey(secret_key)
            .build();
        let pub_nonce: PubNonce = sec_nonce.public_nonce();
        let serialized = pub_nonce.serialize();

        if self.used_nonces.contains(&serialized) {
            // Astronomically unlikely RNG collision; refuse rather than
            // risk ever re-signing with a nonce already on the ledger.
            return Err(MuSigError::NonceCollision);
        }

        self.local_sec_nonce = Some(sec_nonce);
        self.local_pub_nonce = Some(serialized);
        self.phase = SessionPhase::NoncesGenerated;
        Ok(serialized)
    }

    /// Bind the counterparty's public nonce. Pure setter, no validation
    /// beyond the caller having already checked the 66-byte length at the
    /// coordinator boundary.
    pub fn set_remote_nonce(&mut self, remote_pub_nonce: [u8; 66]) {
        self.remote_pub_nonce = Some(remote_pub_nonce);
    }

    /// Apply the taproot tweak using the script tree's merkle root (never
    /// the unkeyed BIP-86 tweak, since a script path always exists here),
    /// and require both public keys and both public nonces to be bound.
    pub fn init_signing_session(&mut self) -> Result<(), MuSigError> {
        if self.remote_pub_key.is_none() {
            return Err(MuSigError::MissingRemotePubkey);
        }
        if self.remote_pub_nonce.is_none() || self.local_pub_nonce.is_none() {
            return Err(MuSigError::MissingRemoteNonce);
        }

        let tree = self.script_tree.as_ref().ok_or(MuSigError::KeyAggregationFailed(
            "script tree must be built via taproot_address_with_refund before signing".to_string(),
        ))?;

        let ctx = self.key_agg_ctx.take().ok_or(MuSigError::MissingRemotePubkey)?;
        let tweaked = ctx
            .with_taproot_tweak(tree.merkle_root().as_ref())
            .map_err(|e| MuSigError::KeyAggregationFailed(e.to_string()))?;
        self.key_agg_ctx = Some(tweaked);
        Ok(())
    }

    fn aggregate_nonce(&self) -> Result<AggNonce, MuSigError> {
        let local = self.local_pub_nonce.ok_or(MuSigError::MissingRemoteNonce)?;
        let remote = self.remote_pub_nonce.ok_or(MuSigError::MissingRemoteNonce)?;

        let local = PubNonce::from_bytes(&local).map_err(|e| MuSigError::SigningFailed(e.to_string()))?;
        let remote = PubNonce::from_bytes(&remote).map_err(|e| MuSigError::SigningFailed(e.to_string()))?;
        Ok(local.into_aggregate([remote]))
    }

    /// Produce this party's partial signature over `sighash`.
    ///
    /// Refuses if the session is invalidated, the nonce has already been
    /// used, or (belt and suspenders) the current public nonce is already
    /// in `used_nonces`. On success, sets `phase = Signed` (which implies
    /// both `nonce_used` and `invalidated` via their derived accessors) and
    /// records the nonce in `used_nonces` *before* returning — there is no
    /// window in which the signature is handed to the caller while the
    /// session still looks signable.
    pub fn sign(&mut self, sighash: &[u8]) -> Result<PartialSignature, MuSigError> {
        if sighash.len() != 32 {
            return Err(MuSigError::InvalidSighashLength);
        }
        if self.invalidated() {
            return Err(MuSigError::SessionInvalidated);
        }

        let current_nonce = self.local_pub_nonce.ok_or(MuSigError::MissingRemoteNonce)?;
        if self.used_nonces.contains(&current_nonce) {
            return Err(MuSigError::NonceAlreadyUsed);
        }

        let ctx = self.key_agg_ctx.as_ref().ok_or(MuSigError::MissingRemotePubkey)?;
        let sec_nonce = self
            .local_sec_nonce
            .take()
            .ok_or(MuSigError::MissingRemoteNonce)?;
        let agg_nonce = self.aggregate_nonce()?;
        let secret_key = MusigSecretKey::from_slice(&self.local_priv_key)
            .map_err(|e| MuSigError::SigningFailed(e.to_string()))?;

        let partial: PartialSignature = musig2::sign_partial(ctx, secret_key, sec_nonce, &agg_nonce, sighash)
            .map_err(|e| MuSigError::SigningFailed(e.to_string()))?;

        // Commit the invalidation atomically with the signature: no other
        // caller can observe a "signed but still valid" state.
        self.used_nonces.insert(current_nonce);
        self.phase = SessionPhase::Signed;

        Ok(partial)
    }

    /// Combine this party's partial signature with the counterparty's,
    /// verifying the result against the tweaked aggregate key before
    /// returning it.
    pub fn combine(&self, local_partial: PartialSignature, remote_partial: PartialSignature, sighash: &[u8]) -> Result<[u8; 64], MuSigError> {
        let ctx = self.key_agg_ctx.as_ref().ok_or(MuSigError::MissingRemotePubkey)?;
        let agg_nonce = self.aggregate_nonce()?;

        let signature: musig2::CompactSignature =
            musig2::aggregate_partial_signatures(ctx, &agg_nonce, [local_partial, remote_partial], sighash)
                .map_err(|e| MuSigError::SigningFailed(e.to_string()))?;

        let agg_point: MusigPublicKey = ctx.aggregated_pubkey();
        musig2::verify_single(agg_point, signature, sighash)
            .map_err(|_| MuSigError::SignatureVerificationFailed)?;

        Ok(signature.serialize())
    }

    /// The only legal path to signing again after a successful `sign`:
    /// generates fresh nonces (moving the old one into `used_nonces`),
    /// clears the bound remote nonce, and requires it to be re-exchanged
    /// before `init_signing_session`/`sign` can proceed.
    pub fn reset_for_new_sign(&mut self) -> Result<[u8; 66], MuSigError> {
        self.remote_pub_nonce = None;
        self.generate_nonces()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pair() -> (MuSig2Session, MuSig2Session) {
        let a = MuSig2Session::new("BTC", Network::Testnet, true, [1u8; 32]).unwrap();
        let b = MuSig2Session::new("BTC", Network::Testnet, true, [2u8; 32]).unwrap();
        (a, b)
    }

    #[test]
    fn rejects_chains_without_taproot() {
        let err = MuSig2Session::new("DOGE", Network::Testnet, false, [1u8; 32]).unwrap_err();
        assert!(matches!(err, MuSigError::TaprootNotSupported));
    }

    #[test]
    fn key_aggregation_is_order_independent() {
        let (mut a, mut b) = make_pair();
        let pk_a = a.local_pub_key();
        let pk_b = b.local_pub_key();

        a.set_remote_pubkey(pk_b).unwrap();
        b.set_remote_pubkey(pk_a).unwrap();

        assert_eq!(a.aggregated_pubkey().unwrap(), b.aggregated_pubkey().unwrap());
    }

    #[test]
    fn swap_id_is_commutative() {
        let (a, b) = make_pair();
        let id1 = MuSig2Session::compute_swap_id(a.local_pub_key(), b.local_pub_key());
        let id2 = MuSig2Session::compute_swap_id(b.local_pub_key(), a.local_pub_key());
        assert_eq!(id1, id2);
    }

    #[test]
    fn generate_nonces_moves_prior_nonce_into_used_set() {
        let (mut a, b) = make_pair();
        a.set_remote_pubkey(b.local_pub_key()).unwrap();

        let first = a.generate_nonces().unwrap();
        assert!(a.used_nonces().is_empty());

        let second = a.generate_nonces().unwrap();
        assert_ne!(first, second);
        assert!(a.used_nonces().contains(&first));
        assert!(!a.used_nonces().contains(&second));
    }

    #[test]
    fn sign_without_nonces_fails() {
        let (mut a, b) = make_pair();
        a.set_remote_pubkey(b.local_pub_key()).unwrap();
        let err = a.sign(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, MuSigError::MissingRemoteNonce));
    }

    #[test]
    fn reset_for_new_sign_requires_fresh_remote_nonce() {
        let (mut a, mut b) = make_pair();
        a.set_remote_pubkey(b.local_pub_key()).unwrap();
        b.set_remote_pubkey(a.local_pub_key()).unwrap();

        let nonce_a = a.generate_nonces().unwrap();
        let nonce_b = b.generate_nonces().unwrap();
        a.set_remote_nonce(nonce_b);
        b.set_remote_nonce(nonce_a);

        a.reset_for_new_sign().unwrap();
        // remote nonce must be rebound before this session is signable again
        assert!(a.init_signing_session().is_err());
    }
}
