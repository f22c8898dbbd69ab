//! EVM HTLC session (spec.md §4.G)
//!
//! Tracks one swap leg against a deployed `SwapHtlc` contract. Produces
//! ABI-encoded call data for the external `ChainBackend` to broadcast, and
//! consumes decoded log data the backend hands back — this session never
//! opens an RPC connection itself.

use alloy_primitives::{Address, FixedBytes, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::evm::abi::{compute_swap_id, decode_swap_claimed_secret, encode_claim, encode_create_swap, encode_refund};
use crate::timeout::{saturating_height, TimeoutCalculator};

/// EVM HTLC session errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvmHtlcError {
    #[error("evm htlc is in state {0:?} and cannot transition to {1:?}")]
    InvalidTransition(EvmHtlcState, EvmHtlcState),

    #[error("secret revealed on chain does not hash to the expected lock")]
    SecretMismatch,

    #[error("log data could not be decoded as a SwapClaimed event")]
    UndecodableLog,

    #[error("timelock has not matured: current height {current_height} is not past timeout {timeout_height}")]
    TimelockNotExpired { current_height: u64, timeout_height: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvmHtlcState {
    Created,
    Funded,
    Claimed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmHtlcSession {
    #[serde(with = "address_hex")]
    pub initiator: Address,
    #[serde(with = "address_hex")]
    pub participant: Address,
    pub hash_lock: [u8; 32],
    pub amount: u128,
    pub timeout_height: u64,
    /// ERC-20 token address, or the zero address for native ETH.
    #[serde(with = "address_hex")]
    pub token: Address,
    /// Disambiguates swaps between the same pair that would otherwise
    /// collide in `compute_swap_id` (spec.md §4.G).
    pub nonce: u64,
    pub chain_id: u64,
    state: EvmHtlcState,
}

#[allow(clippy::too_many_arguments)]
impl EvmHtlcSession {
    pub fn new(
        initiator: Address,
        participant: Address,
        hash_lock: [u8; 32],
        amount: u128,
        timeout_height: u64,
        token: Address,
        nonce: u64,
        chain_id: u64,
    ) -> Self {
        Self {
            initiator,
            participant,
            hash_lock,
            amount,
            timeout_height,
            token,
            nonce,
            chain_id,
            state: EvmHtlcState::Created,
        }
    }

    pub fn state(&self) -> EvmHtlcState {
        self.state
    }

    /// The deterministic on-chain swap id for this leg, matching the
    /// deployed contract's `computeSwapId` (spec.md §4.G).
    pub fn swap_id(&self) -> FixedBytes<32> {
        compute_swap_id(
            self.initiator,
            self.participant,
            self.token,
            U256::from(self.amount),
            FixedBytes::<32>::from(self.hash_lock),
            U256::from(self.timeout_height),
            self.nonce,
            self.chain_id,
        )
    }

    /// Call data for `createSwap`, to be sent by the backend along with
    /// `amount` wei as `msg.value`.
    pub fn encode_create(&self) -> Vec<u8> {
        encode_create_swap(
            self.swap_id(),
            self.participant,
            FixedBytes::<32>::from(self.hash_lock),
            U256::from(self.timeout_height),
        )
    }

    pub fn mark_funded(&mut self) -> Result<(), EvmHtlcError> {
        self.transition(EvmHtlcState::Funded)
    }

    /// Call data for `claim`, revealing `secret`.
    pub fn encode_claim(&mut self, secret: [u8; 32]) -> Result<Vec<u8>, EvmHtlcError> {
        if crate::secret::sha256(&secret) != self.hash_lock {
            return Err(EvmHtlcError::SecretMismatch);
        }
        self.transition(EvmHtlcState::Claimed)?;
        Ok(encode_claim(self.swap_id(), FixedBytes::<32>::from(secret)))
    }

    /// Call data for `refund`. `current_height` must be strictly past
    /// `timeout_height` (spec.md §4.H) before the state machine moves; an
    /// out-of-order call still reports `InvalidTransition` rather than
    /// masking it behind the timelock check.
    pub fn encode_refund(&mut self, current_height: u64) -> Result<Vec<u8>, EvmHtlcError> {
        if self.state != EvmHtlcState::Funded {
            return Err(EvmHtlcError::InvalidTransition(self.state, EvmHtlcState::Refunded));
        }
        let calc = TimeoutCalculator::new();
        if calc.is_safe_to_complete(saturating_height(current_height), saturating_height(self.timeout_height), 0) {
            return Err(EvmHtlcError::TimelockNotExpired {
                current_height,
                timeout_height: self.timeout_height,
            });
        }
        self.transition(EvmHtlcState::Refunded)?;
        Ok(encode_refund(self.swap_id()))
    }

    /// Extract the secret revealed in a counterparty `SwapClaimed` log's
    /// raw data, validating it against `hash_lock`.
    pub fn extract_secret_from_log(&self, log_data: &[u8]) -> Result<[u8; 32], EvmHtlcError> {
        let secret = decode_swap_claimed_secret(log_data).ok_or(EvmHtlcError::UndecodableLog)?;
        if crate::secret::sha256(&secret) != self.hash_lock {
            return Err(EvmHtlcError::SecretMismatch);
        }
        Ok(secret)
    }

    fn transition(&mut self, target: EvmHtlcState) -> Result<(), EvmHtlcError> {
        let allowed = matches!(
            (self.state, target),
            (EvmHtlcState::Created, EvmHtlcState::Funded)
                | (EvmHtlcState::Funded, EvmHtlcState::Claimed)
                | (EvmHtlcState::Funded, EvmHtlcState::Refunded)
        );
        if !allowed {
            return Err(EvmHtlcError::InvalidTransition(self.state, target));
        }
        self.state = target;
        Ok(())
    }
}

mod address_hex {
    use alloy_primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 32] = [0x5A; 32];

    fn session() -> EvmHtlcSession {
        EvmHtlcSession::new(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            crate::secret::sha256(&SECRET),
            1_000_000,
            5000,
            Address::ZERO,
            1,
            1,
        )
    }

    #[test]
    fn swap_id_is_stable() {
        let s = session();
        assert_eq!(s.swap_id(), s.swap_id());
    }

    #[test]
    fn claim_rejects_wrong_secret() {
        let mut s = session();
        s.mark_funded().unwrap();
        let err = s.encode_claim([0u8; 32]).unwrap_err();
        assert_eq!(err, EvmHtlcError::SecretMismatch);
    }

    #[test]
    fn claim_succeeds_with_correct_secret_and_advances_state() {
        let mut s = session();
        s.mark_funded().unwrap();
        s.encode_claim(SECRET).unwrap();
        assert_eq!(s.state(), EvmHtlcState::Claimed);
    }

    #[test]
    fn cannot_fund_twice() {
        let mut s = session();
        s.mark_funded().unwrap();
        let err = s.mark_funded().unwrap_err();
        assert_eq!(err, EvmHtlcError::InvalidTransition(EvmHtlcState::Funded, EvmHtlcState::Funded));
    }

    #[test]
    fn refund_before_timeout_is_rejected() {
        let mut s = session();
        s.mark_funded().unwrap();
        let err = s.encode_refund(10).unwrap_err();
        assert_eq!(err, EvmHtlcError::TimelockNotExpired { current_height: 10, timeout_height: 5000 });
        assert_eq!(s.state(), EvmHtlcState::Funded);
    }

    #[test]
    fn refund_after_timeout_succeeds() {
        let mut s = session();
        s.mark_funded().unwrap();
        let calldata = s.encode_refund(6_000).unwrap();
        assert!(!calldata.is_empty());
        assert_eq!(s.state(), EvmHtlcState::Refunded);
    }

    #[test]
    fn cannot_refund_before_being_funded() {
        let mut s = session();
        let err = s.encode_refund(10_000).unwrap_err();
        assert_eq!(err, EvmHtlcError::InvalidTransition(EvmHtlcState::Created, EvmHtlcState::Refunded));
    }
}
