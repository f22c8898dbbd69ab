//! Secret Vault (spec.md §4.C)
//!
//! The swap's atomic bond: a 32-byte preimage and its SHA-256 hash. Once the
//! responder reveals the preimage on chain to claim the initiator's funds,
//! the initiator's coordinator observes it and claims the responder's funds
//! before the responder's lock expires.

use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Secret vault errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("claim transaction did not contain a recognizable preimage")]
    PreimageNotFound,

    #[error("extracted preimage does not match the expected hash")]
    PreimageMismatch,
}

/// Generate a fresh 32-byte secret and its SHA-256 hash, using the OS RNG —
/// this is cryptographic key material, not a derived/ephemeral signing key,
/// so it warrants the OS source explicitly rather than a general-purpose
/// thread-local RNG.
pub fn generate() -> ([u8; 32], [u8; 32]) {
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    let hash = sha256(&secret);
    (secret, hash)
}

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Constant-time check that `SHA-256(secret) == hash`.
///
/// A nonce-reuse-grade secret deserves a non-short-circuiting comparison:
/// this accumulates the byte-wise XOR across the full hash before testing
/// for zero, rather than returning early on the first mismatching byte.
pub fn verify(secret: &[u8; 32], hash: &[u8; 32]) -> bool {
    let computed = sha256(secret);
    let mut diff: u8 = 0;
    for (a, b) in computed.iter().zip(hash.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Extract the preimage revealed in a UTXO HTLC claim witness.
///
/// The claim witness pushes the preimage before the claimer's signature, as
/// the last item before the script/control-block tail added by the
/// interpreter (`OP_SHA256 <hash> OP_EQUALVERIFY <claim_pk> OP_CHECKSIG`
/// per spec.md §4.F): `witness_items[1]` is the secret, `witness_items[0]`
/// the signature, when spending the claim branch.
pub fn extract_from_htlc_witness(witness_items: &[Vec<u8>], expected_hash: &[u8; 32]) -> Result<[u8; 32], VaultError> {
    let candidate = witness_items
        .iter()
        .find(|item| item.len() == 32 && verify(&to_array(item), expected_hash))
        .ok_or(VaultError::PreimageNotFound)?;

    Ok(to_array(candidate))
}

/// Extract the preimage from a decoded EVM `SwapClaimed(swap_id, receiver,
/// secret)` event's data field (already ABI-decoded to raw bytes by the
/// caller; see `crate::evm::abi`).
pub fn extract_from_evm_log(secret_field: &[u8], expected_hash: &[u8; 32]) -> Result<[u8; 32], VaultError> {
    if secret_field.len() != 32 {
        return Err(VaultError::PreimageNotFound);
    }
    let secret = to_array(secret_field);
    if !verify(&secret, expected_hash) {
        return Err(VaultError::PreimageMismatch);
    }
    Ok(secret)
}

fn to_array(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[..32]);
    out
}
