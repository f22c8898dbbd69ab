//! EVM HTLC ABI (spec.md §4.G)
//!
//! Declares the on-chain interface of the deployed HTLC contract with
//! `alloy_sol_types::sol!` so call data and event logs are encoded/decoded
//! with the same types Solidity itself uses (`uint256`, `bytes32`,
//! `address`), rather than hand-rolled byte offsets. No live provider is
//! constructed here or anywhere in this crate — encoding/decoding is pure,
//! and the actual RPC call/subscription is the external `ChainBackend`'s
//! job (spec.md §6).

use alloy_primitives::{keccak256, Address, FixedBytes, U256};
use alloy_sol_types::sol;

sol! {
    interface SwapHtlc {
        event SwapCreated(bytes32 indexed swapId, address indexed initiator, address indexed participant, uint256 amount, bytes32 hashLock, uint256 timeoutHeight);
        event SwapClaimed(bytes32 indexed swapId, address indexed receiver, bytes32 secret);
        event SwapRefunded(bytes32 indexed swapId);

        function createSwap(bytes32 swapId, address participant, bytes32 hashLock, uint256 timeoutHeight) external payable;
        function claim(bytes32 swapId, bytes32 secret) external;
        function refund(bytes32 swapId) external;
    }
}

/// Deterministic swap id for an EVM leg, matching the on-chain contract's
/// `computeSwapId` (spec.md §4.G):
/// `keccak256(sender || receiver || token || amount || secret_hash || timelock || nonce || chain_id)`.
/// Distinct from [`crate::musig2_session::MuSig2Session::compute_swap_id`]
/// because EVM HTLCs key by contract-level swap id rather than aggregated
/// public key, and from the coordinator's internal opaque trade handle
/// (spec.md §4.G note) which is never fed on-chain.
#[allow(clippy::too_many_arguments)]
pub fn compute_swap_id(
    sender: Address,
    receiver: Address,
    token: Address,
    amount: U256,
    secret_hash: FixedBytes<32>,
    timelock: U256,
    nonce: u64,
    chain_id: u64,
) -> FixedBytes<32> {
    let mut buf = Vec::with_capacity(20 + 20 + 20 + 32 + 32 + 32 + 32 + 32);
    buf.extend_from_slice(sender.as_slice());
    buf.extend_from_slice(receiver.as_slice());
    buf.extend_from_slice(token.as_slice());
    buf.extend_from_slice(&amount.to_be_bytes::<32>());
    buf.extend_from_slice(secret_hash.as_slice());
    buf.extend_from_slice(&timelock.to_be_bytes::<32>());
    buf.extend_from_slice(&U256::from(nonce).to_be_bytes::<32>());
    buf.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    keccak256(buf)
}

/// ABI-encode a `claim(swapId, secret)` call.
pub fn encode_claim(swap_id: FixedBytes<32>, secret: FixedBytes<32>) -> Vec<u8> {
    use alloy_sol_types::SolCall;
    SwapHtlc::claimCall { swapId: swap_id, secret }.abi_encode()
}

/// ABI-encode a `refund(swapId)` call.
pub fn encode_refund(swap_id: FixedBytes<32>) -> Vec<u8> {
    use alloy_sol_types::SolCall;
    SwapHtlc::refundCall { swapId: swap_id }.abi_encode()
}

/// ABI-encode a `createSwap(...)` call.
pub fn encode_create_swap(swap_id: FixedBytes<32>, participant: Address, hash_lock: FixedBytes<32>, timeout_height: U256) -> Vec<u8> {
    use alloy_sol_types::SolCall;
    SwapHtlc::createSwapCall {
        swapId: swap_id,
        participant,
        hashLock: hash_lock,
        timeoutHeight: timeout_height,
    }
    .abi_encode()
}

/// Decode a `SwapClaimed` log's revealed secret from the event's raw
/// (non-indexed) data word. `secret` is the event's only non-indexed field,
/// so the data section is exactly one 32-byte word.
pub fn decode_swap_claimed_secret(data: &[u8]) -> Option<[u8; 32]> {
    if data.len() != 32 {
        return None;
    }
    let mut secret = [0u8; 32];
    secret.copy_from_slice(data);
    Some(secret)
}
