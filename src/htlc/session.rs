//! UTXO HTLC session (spec.md §4.F)
//!
//! State machine and address/witness derivation for a single HTLC leg on a
//! chain without taproot support. Mirrors [`crate::musig2_session`]'s split
//! between pure cryptographic operations (owned here) and chain I/O (owned
//! by the external `ChainBackend`, spec.md §6) — this session never
//! broadcasts anything itself.

use bitcoin::hashes::Hash;
use bitcoin::{Network as BitcoinNetwork, PublicKey, ScriptBuf, WScriptHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::htlc::script::{build_htlc_script, claim_witness, refund_witness};
use crate::timeout::{saturating_height, TimeoutCalculator};

/// HTLC session errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HtlcError {
    #[error("htlc is in state {0:?} and cannot transition to {1:?}")]
    InvalidTransition(HtlcState, HtlcState),

    #[error("htlc has already been claimed or refunded")]
    AlreadySettled,

    #[error("timelock has not matured: current height {current_height} is not past timeout {timeout_height}")]
    TimelockNotExpired { current_height: u64, timeout_height: u64 },
}

/// HTLC lifecycle state (spec.md §4.F), mirroring the funding/claim/refund
/// progression shared with the MuSig2 leg's `SessionPhase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtlcState {
    Created,
    Funded,
    Claimed,
    Refunded,
}

/// A single HTLC leg: the script, its P2WSH address, and lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtlcSession {
    pub secret_hash: [u8; 32],
    pub claim_pubkey: [u8; 33],
    pub refund_pubkey: [u8; 33],
    pub timeout_blocks: u32,
    state: HtlcState,
}

impl HtlcSession {
    pub fn new(secret_hash: [u8; 32], claim_pubkey: [u8; 33], refund_pubkey: [u8; 33], timeout_blocks: u32) -> Self {
        Self {
            secret_hash,
            claim_pubkey,
            refund_pubkey,
            timeout_blocks,
            state: HtlcState::Created,
        }
    }

    pub fn state(&self) -> HtlcState {
        self.state
    }

    fn script(&self) -> Result<ScriptBuf, bitcoin::key::FromSliceError> {
        let claim = PublicKey::from_slice(&self.claim_pubkey)?;
        let refund = PublicKey::from_slice(&self.refund_pubkey)?;
        Ok(build_htlc_script(&self.secret_hash, &claim, self.timeout_blocks, &refund))
    }

    /// The P2WSH address funds must be sent to.
    pub fn funding_address(&self, network: BitcoinNetwork) -> Result<bitcoin::Address, bitcoin::key::FromSliceError> {
        let script = self.script()?;
        let wscript_hash = WScriptHash::hash(script.as_bytes());
        Ok(bitcoin::Address::p2wsh_from_hash(wscript_hash, network))
    }

    /// Mark the funding transaction as seen on chain.
    pub fn mark_funded(&mut self) -> Result<(), HtlcError> {
        self.transition(HtlcState::Funded)
    }

    /// Build the claim witness, revealing `secret`, and mark claimed.
    pub fn build_claim_witness(&mut self, signature: &[u8], secret: &[u8; 32]) -> Result<Vec<Vec<u8>>, HtlcError> {
        self.transition(HtlcState::Claimed)?;
        let script = self.script().map_err(|_| HtlcError::AlreadySettled)?;
        Ok(claim_witness(signature, secret, &script))
    }

    /// Build the refund witness and mark refunded. `current_height` must be
    /// strictly past `timeout_blocks` (spec.md §4.H: refund is only valid
    /// strictly after timeout) before the state machine is allowed to move;
    /// an out-of-order call (e.g. already claimed) still reports
    /// `InvalidTransition` rather than masking it behind the timelock check.
    pub fn build_refund_witness(&mut self, signature: &[u8], current_height: u64) -> Result<Vec<Vec<u8>>, HtlcError> {
        if self.state != HtlcState::Funded {
            return Err(HtlcError::InvalidTransition(self.state, HtlcState::Refunded));
        }
        let calc = TimeoutCalculator::new();
        if calc.is_safe_to_complete(saturating_height(current_height), self.timeout_blocks, 0) {
            return Err(HtlcError::TimelockNotExpired {
                current_height,
                timeout_height: self.timeout_blocks as u64,
            });
        }
        self.transition(HtlcState::Refunded)?;
        let script = self.script().map_err(|_| HtlcError::AlreadySettled)?;
        Ok(refund_witness(signature, &script))
    }

    fn transition(&mut self, target: HtlcState) -> Result<(), HtlcError> {
        let allowed = matches!(
            (self.state, target),
            (HtlcState::Created, HtlcState::Funded)
                | (HtlcState::Funded, HtlcState::Claimed)
                | (HtlcState::Funded, HtlcState::Refunded)
        );
        if !allowed {
            return Err(HtlcError::InvalidTransition(self.state, target));
        }
        self.state = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> HtlcSession {
        HtlcSession::new([0xAA; 32], [0x02; 33], [0x03; 33], 144)
    }

    #[test]
    fn funding_address_is_stable_for_same_inputs() {
        let s = session();
        let addr1 = s.funding_address(BitcoinNetwork::Testnet).unwrap();
        let addr2 = s.funding_address(BitcoinNetwork::Testnet).unwrap();
        assert_eq!(addr1, addr2);
    }

    #[test]
    fn cannot_claim_before_funded() {
        let mut s = session();
        let err = s.build_claim_witness(&[0u8; 64], &[1u8; 32]).unwrap_err();
        assert_eq!(err, HtlcError::InvalidTransition(HtlcState::Created, HtlcState::Claimed));
    }

    #[test]
    fn claim_then_refund_is_rejected() {
        let mut s = session();
        s.mark_funded().unwrap();
        s.build_claim_witness(&[0u8; 64], &[1u8; 32]).unwrap();
        let err = s.build_refund_witness(&[0u8; 64], 1_000).unwrap_err();
        assert_eq!(err, HtlcError::InvalidTransition(HtlcState::Claimed, HtlcState::Refunded));
    }

    #[test]
    fn funded_can_refund() {
        let mut s = session();
        s.mark_funded().unwrap();
        let witness = s.build_refund_witness(&[0u8; 64], 200).unwrap();
        assert_eq!(s.state(), HtlcState::Refunded);
        assert_eq!(witness.len(), 3);
    }

    #[test]
    fn refund_before_timeout_is_rejected() {
        let mut s = session();
        s.mark_funded().unwrap();
        let err = s.build_refund_witness(&[0u8; 64], 10).unwrap_err();
        assert_eq!(err, HtlcError::TimelockNotExpired { current_height: 10, timeout_height: 144 });
        assert_eq!(s.state(), HtlcState::Funded, "a rejected refund must not move the state machine");
    }
}
