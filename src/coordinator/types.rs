//! Coordinator domain types (spec.md §3, §9 REDESIGN FLAGS)

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::adaptor::AdaptorSession;
use crate::evm::EvmHtlcSession;
use crate::htlc::HtlcSession;
use crate::musig2_session::MuSig2Session;

/// A swap's stable identifier: `trade_id` as negotiated over [`crate::p2p`],
/// independent of the per-chain MuSig2 `compute_swap_id` (which is derived
/// from aggregated keys and only exists for MuSig2 legs).
pub type TradeId = String;

/// Which side of a swap this coordinator instance is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    pub fn counterparty(self) -> Role {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }
}

/// Which cryptographic mechanism secures a given leg of the swap.
///
/// Solana does not get its own variant: spec.md's method selection is
/// keyed on *mechanism* (MuSig2 aggregation, UTXO HTLC script, adaptor
/// signature, EVM contract HTLC), not on chain family, and an SPL-token
/// leg on Solana is secured the same way an EVM leg is — through a
/// contract-level HTLC the external `ChainBackend` calls into — so it is
/// represented as `EvmHtlc`'s sibling would be, via the same enum case a
/// contract-HTLC chain uses. See `DESIGN.md` for the recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapMethod {
    MuSig2,
    Htlc,
    Adaptor,
    EvmHtlc,
}

/// Swap lifecycle phase. Each variant's legal predecessors are enumerated
/// in [`Phase::allowed_predecessors`] so [`super::service::SwapCoordinator`]
/// can reject an out-of-order transition the same way
/// [`crate::musig2_session::SessionPhase`] rejects signing twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Negotiating,
    KeysExchanged,
    NoncesExchanged,
    Funding,
    Funded,
    Signing,
    Signed,
    SecretRevealed,
    Completed,
    Refunded,
    Failed,
}

impl Phase {
    /// Phases from which a transition into `self` is legal.
    pub fn allowed_predecessors(self) -> &'static [Phase] {
        use Phase::*;
        match self {
            Negotiating => &[],
            KeysExchanged => &[Negotiating],
            NoncesExchanged => &[KeysExchanged],
            Funding => &[NoncesExchanged],
            Funded => &[Funding],
            Signing => &[Funded],
            Signed => &[Signing],
            SecretRevealed => &[Signed],
            Completed => &[SecretRevealed],
            Refunded => &[Funded, Signing, Signed, SecretRevealed],
            Failed => &[Negotiating, KeysExchanged, NoncesExchanged, Funding, Funded, Signing, Signed],
        }
    }

    pub fn can_transition_to(self, target: Phase) -> bool {
        target.allowed_predecessors().contains(&self)
    }

    /// Terminal phases from which no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Refunded | Phase::Failed)
    }
}

/// The cryptographic session backing one leg of a swap, one variant per
/// [`SwapMethod`] (spec.md §9 REDESIGN FLAG: a sum type here instead of a
/// single struct whose fields are only valid "depending on which method
/// this swap actually uses" — matching `SessionPhase` replacing two
/// independent booleans for the same reason).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MethodSession {
    MuSig2(MuSig2Session),
    Htlc(HtlcSession),
    Adaptor(#[serde(skip)] AdaptorSessionState),
    EvmHtlc(EvmHtlcSession),
}

/// [`AdaptorSession`] holds a live `secp256k1::Secp256k1` context and isn't
/// itself serializable; swaps using it persist only the derived state
/// needed to rehydrate (spec.md §4.F persistence contract), and
/// reconstruct the session from the local private key on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptorSessionState {
    pub adaptor_point: Option<[u8; 33]>,
    pub encrypted_signature: Option<Vec<u8>>,
}

impl MethodSession {
    pub fn method(&self) -> SwapMethod {
        match self {
            MethodSession::MuSig2(_) => SwapMethod::MuSig2,
            MethodSession::Htlc(_) => SwapMethod::Htlc,
            MethodSession::Adaptor(_) => SwapMethod::Adaptor,
            MethodSession::EvmHtlc(_) => SwapMethod::EvmHtlc,
        }
    }

    pub fn as_musig2(&self) -> Option<&MuSig2Session> {
        match self {
            MethodSession::MuSig2(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_musig2_mut(&mut self) -> Option<&mut MuSig2Session> {
        match self {
            MethodSession::MuSig2(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_htlc_mut(&mut self) -> Option<&mut HtlcSession> {
        match self {
            MethodSession::Htlc(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_evm_htlc_mut(&mut self) -> Option<&mut EvmHtlcSession> {
        match self {
            MethodSession::EvmHtlc(s) => Some(s),
            _ => None,
        }
    }

    /// The chain height at which this leg's refund path matures, if this
    /// method carries a timelock at all. `Adaptor` has no independent
    /// timelock of its own (spec.md §4.F's adaptor signature is backed by
    /// the counterparty leg's timelock) so refund-gating is a no-op there.
    pub fn timeout_height(&self) -> Option<u64> {
        match self {
            MethodSession::MuSig2(s) => s.refund_timeout_blocks().map(u64::from),
            MethodSession::Htlc(s) => Some(s.timeout_blocks as u64),
            MethodSession::Adaptor(_) => None,
            MethodSession::EvmHtlc(s) => Some(s.timeout_height),
        }
    }
}

/// A negotiated offer, before any cryptographic material has been
/// exchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub trade_id: TradeId,
    pub send_symbol: String,
    pub send_amount: u128,
    pub receive_symbol: String,
    pub receive_amount: u128,
    pub method: SwapMethod,
    pub role: Role,
}

/// A swap actively being coordinated: one [`MethodSession`] per leg (the
/// coin this party sends, and the coin it receives), tracked through
/// [`Phase`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSwap {
    pub offer: Offer,
    pub phase: Phase,
    pub send_session: Option<MethodSession>,
    pub receive_session: Option<MethodSession>,
    pub secret_hash: Option<[u8; 32]>,
    pub secret: Option<[u8; 32]>,
    /// The counterparty's compressed MuSig2 pubkey, bound by
    /// `respond_to_swap` (spec.md §4.H). `None` until a responder has
    /// accepted the offer.
    pub remote_pubkey: Option<[u8; 33]>,
    pub funding_txids: HashSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ActiveSwap {
    pub fn new(offer: Offer, created_at: String) -> Self {
        Self {
            offer,
            phase: Phase::Negotiating,
            send_session: None,
            receive_session: None,
            secret_hash: None,
            secret: None,
            remote_pubkey: None,
            funding_txids: HashSet::new(),
            updated_at: created_at.clone(),
            created_at,
        }
    }

    /// Advance `phase`, rejecting any transition [`Phase::allowed_predecessors`]
    /// doesn't sanction.
    pub fn transition(&mut self, target: Phase, now: String) -> Result<(), super::service::CoordinatorError> {
        if !self.phase.can_transition_to(target) {
            return Err(super::service::CoordinatorError::IllegalPhaseTransition {
                from: self.phase,
                to: target,
            });
        }
        self.phase = target;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions_follow_the_happy_path() {
        use Phase::*;
        let happy_path = [
            Negotiating,
            KeysExchanged,
            NoncesExchanged,
            Funding,
            Funded,
            Signing,
            Signed,
            SecretRevealed,
            Completed,
        ];
        for window in happy_path.windows(2) {
            assert!(window[0].can_transition_to(window[1]), "{:?} -> {:?}", window[0], window[1]);
        }
    }

    #[test]
    fn cannot_skip_phases() {
        assert!(!Phase::Negotiating.can_transition_to(Phase::Funded));
    }

    #[test]
    fn refund_is_reachable_from_any_funded_phase() {
        for phase in [Phase::Funded, Phase::Signing, Phase::Signed, Phase::SecretRevealed] {
            assert!(phase.can_transition_to(Phase::Refunded));
        }
    }

    #[test]
    fn terminal_phases_are_marked() {
        assert!(Phase::Completed.is_terminal());
        assert!(Phase::Refunded.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Funded.is_terminal());
    }
}
