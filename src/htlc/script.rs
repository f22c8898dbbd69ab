//! Legacy (non-taproot) UTXO HTLC script (spec.md §4.F)
//!
//! Used for coins that don't support taproot (e.g. DOGE). Single combined
//! script with two branches, selected by the witness's `OP_IF` flag at
//! spend time:
//!
//! ```text
//! OP_IF
//!     OP_SHA256 <hash> OP_EQUALVERIFY <claim_pk> OP_CHECKSIG
//! OP_ELSE
//!     <timeout> OP_CSV OP_DROP <refund_pk> OP_CHECKSIG
//! OP_ENDIF
//! ```

use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CSV, OP_DROP, OP_ELSE, OP_ENDIF, OP_EQUALVERIFY, OP_IF, OP_SHA256,
};
use bitcoin::script::Builder as ScriptBuilder;
use bitcoin::{PublicKey, ScriptBuf};

/// Build the combined claim/refund HTLC script.
pub fn build_htlc_script(hash: &[u8; 32], claim_pubkey: &PublicKey, timeout_blocks: u32, refund_pubkey: &PublicKey) -> ScriptBuf {
    ScriptBuilder::new()
        .push_opcode(OP_IF)
        .push_opcode(OP_SHA256)
        .push_slice(hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_key(claim_pubkey)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ELSE)
        .push_int(timeout_blocks as i64)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_key(refund_pubkey)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// Witness stack for the claim branch: `[signature, secret, OP_TRUE, script]`.
/// The `OP_TRUE` (encoded as `0x01`) selects the `OP_IF` branch.
pub fn claim_witness(signature: &[u8], secret: &[u8; 32], script: &ScriptBuf) -> Vec<Vec<u8>> {
    vec![signature.to_vec(), secret.to_vec(), vec![1u8], script.to_bytes()]
}

/// Witness stack for the refund branch: `[signature, OP_FALSE, script]`.
/// The empty vector selects the `OP_ELSE` branch.
pub fn refund_witness(signature: &[u8], script: &ScriptBuf) -> Vec<Vec<u8>> {
    vec![signature.to_vec(), Vec::new(), script.to_bytes()]
}
