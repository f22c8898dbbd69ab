//! S5: native-ETH HTLC leg, exercised directly against `EvmHtlcSession` —
//! a successful create/fund/claim with the right preimage, and a parallel
//! create/fund/refund once the timelock has passed.

use swap_coordinator::evm::{EvmHtlcError, EvmHtlcSession, EvmHtlcState};
use swap_coordinator::secret;
use swap_coordinator::timeout::TimeoutCalculator;

fn addr(byte: u8) -> alloy_primitives::Address {
    alloy_primitives::Address::repeat_byte(byte)
}

#[test]
fn s5_claim_with_the_right_preimage_succeeds() {
    let (secret_value, hash_lock) = secret::generate();
    let mut session = EvmHtlcSession::new(addr(0x11), addr(0x22), hash_lock, 1_000_000_000_000_000_000, 3_600, addr(0x00), 1, 1);

    assert_eq!(session.state(), EvmHtlcState::Created);
    let create_calldata = session.encode_create();
    assert!(!create_calldata.is_empty());

    session.mark_funded().unwrap();
    assert_eq!(session.state(), EvmHtlcState::Funded);

    let claim_calldata = session.encode_claim(secret_value).unwrap();
    assert!(!claim_calldata.is_empty());
    assert_eq!(session.state(), EvmHtlcState::Claimed);

    // Funded -> Claimed is one-way; a second claim attempt is rejected
    // even with the right secret.
    let err = session.encode_claim(secret_value).unwrap_err();
    assert_eq!(err, EvmHtlcError::InvalidTransition(EvmHtlcState::Claimed, EvmHtlcState::Claimed));
}

#[test]
fn s5_claim_with_the_wrong_preimage_is_rejected_and_state_does_not_move() {
    let (_secret_value, hash_lock) = secret::generate();
    let mut session = EvmHtlcSession::new(addr(0x11), addr(0x22), hash_lock, 1_000_000_000_000_000_000, 3_600, addr(0x00), 1, 1);
    session.mark_funded().unwrap();

    let wrong_secret = [0x55u8; 32];
    let err = session.encode_claim(wrong_secret).unwrap_err();
    assert_eq!(err, EvmHtlcError::SecretMismatch);
    assert_eq!(session.state(), EvmHtlcState::Funded);
}

#[test]
fn s5_refund_after_expiry_succeeds() {
    let (_secret_value, hash_lock) = secret::generate();
    let timeout_height = 100u64;
    let mut session = EvmHtlcSession::new(addr(0x33), addr(0x44), hash_lock, 500_000_000_000_000_000, timeout_height, addr(0x00), 1, 1);
    session.mark_funded().unwrap();

    let calc = TimeoutCalculator::new();
    let safety_margin = calc.minimum_safety_margin_blocks(12);
    let current_height = 9_000u64;
    assert!(!calc.is_safe_to_complete(current_height as u32, timeout_height as u32, safety_margin));

    // Too early: the session itself refuses, not just our standalone check above.
    let err = session.encode_refund(timeout_height - 1).unwrap_err();
    assert_eq!(err, EvmHtlcError::TimelockNotExpired { current_height: timeout_height - 1, timeout_height });
    assert_eq!(session.state(), EvmHtlcState::Funded);

    let refund_calldata = session.encode_refund(current_height).unwrap();
    assert!(!refund_calldata.is_empty());
    assert_eq!(session.state(), EvmHtlcState::Refunded);

    // Refunded is terminal.
    let err = session.encode_refund(current_height).unwrap_err();
    assert_eq!(err, EvmHtlcError::InvalidTransition(EvmHtlcState::Refunded, EvmHtlcState::Refunded));
}

#[test]
fn s5_cannot_refund_before_being_funded() {
    let (_secret_value, hash_lock) = secret::generate();
    let mut session = EvmHtlcSession::new(addr(0x55), addr(0x66), hash_lock, 1, 10, addr(0x00), 1, 1);
    let err = session.encode_refund(10_000).unwrap_err();
    assert_eq!(err, EvmHtlcError::InvalidTransition(EvmHtlcState::Created, EvmHtlcState::Refunded));
}
