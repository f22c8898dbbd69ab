//! Taproot Script Builder (spec.md §4.E)
//!
//! Builds the single-leaf taproot output used by a MuSig2 swap: key path
//! spends cooperatively with the aggregated MuSig2 signature, script path
//! lets either party sweep back to the refund key once the relative
//! timelock has matured. The internal key is always the session's
//! *aggregated* MuSig2 key, never a solo key — this is what makes the
//! cooperative spend indistinguishable on chain from any other taproot
//! key-path spend.

use bitcoin::opcodes::all::{OP_CHECKSIGVERIFY, OP_CSV};
use bitcoin::script::Builder as ScriptBuilder;
use bitcoin::taproot::{ControlBlock, LeafVersion, TaprootBuilder, TaprootSpendInfo};
use bitcoin::{Address, Network as BitcoinNetwork, ScriptBuf, XOnlyPublicKey};
use thiserror::Error;

/// Taproot construction errors.
#[derive(Debug, Error)]
pub enum TaprootError {
    #[error("failed to assemble taproot script tree: {0}")]
    TreeBuildFailed(String),

    #[error("failed to finalize taproot spend info: {0}")]
    FinalizeFailed(String),

    #[error("refund timelock must be non-zero")]
    ZeroTimelock,

    #[error("no control block available for the refund leaf")]
    MissingControlBlock,
}

/// Refund script: `<refund_pubkey> OP_CHECKSIGVERIFY <timeout_blocks> OP_CSV`.
/// Spendable by whoever holds `refund_pubkey` once `timeout_blocks` relative
/// blocks have matured since the funding output confirmed (spec.md §4.F's
/// HTLC refund branch, reused here as the sole taproot leaf).
pub fn build_refund_script(refund_pubkey: &XOnlyPublicKey, timeout_blocks: u32) -> ScriptBuf {
    ScriptBuilder::new()
        .push_x_only_key(refund_pubkey)
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_int(timeout_blocks as i64)
        .push_opcode(OP_CSV)
        .into_script()
}

/// A finalized taproot script tree for one swap leg: internal key (MuSig2
/// aggregate) plus a single refund leaf.
#[derive(Debug, Clone)]
pub struct TaprootScriptTree {
    internal_key: XOnlyPublicKey,
    refund_script: ScriptBuf,
    spend_info: TaprootSpendInfo,
    timeout_blocks: u32,
}

impl TaprootScriptTree {
    /// Build the tree: one leaf containing the refund script, the MuSig2
    /// aggregate as the internal (key-path) key.
    pub fn build(internal_key: XOnlyPublicKey, refund_pubkey: [u8; 32], timeout_blocks: u32) -> Result<Self, TaprootError> {
        if timeout_blocks == 0 {
            return Err(TaprootError::ZeroTimelock);
        }

        let refund_xonly = XOnlyPublicKey::from_slice(&refund_pubkey)
            .map_err(|e| TaprootError::TreeBuildFailed(e.to_string()))?;
        let refund_script = build_refund_script(&refund_xonly, timeout_blocks);

        let secp = bitcoin::secp256k1::Secp256k1::verification_only();
        let builder = TaprootBuilder::new()
            .add_leaf(0, refund_script.clone())
            .map_err(|e| TaprootError::TreeBuildFailed(e.to_string()))?;

        let spend_info = builder
            .finalize(&secp, internal_key)
            .map_err(|_| TaprootError::FinalizeFailed("builder did not finalize into a valid tree".to_string()))?;

        Ok(Self {
            internal_key,
            refund_script,
            spend_info,
            timeout_blocks,
        })
    }

    /// Relative-blocks refund timelock this tree's leaf was built with.
    pub fn timeout_blocks(&self) -> u32 {
        self.timeout_blocks
    }

    /// The bech32m taproot address for this tree.
    pub fn address(&self, network: BitcoinNetwork) -> Address {
        Address::p2tr_tweaked(self.spend_info.output_key(), network)
    }

    /// The merkle root to feed into the MuSig2 taproot tweak (spec.md §4.D:
    /// "applies the taproot tweak using the script tree's merkle root, not
    /// the unkeyed BIP-86 tweak").
    pub fn merkle_root(&self) -> bitcoin::taproot::TapNodeHash {
        self.spend_info
            .merkle_root()
            .expect("tree was built with exactly one leaf, so a merkle root always exists")
    }

    pub fn refund_script(&self) -> &ScriptBuf {
        &self.refund_script
    }

    /// Control block needed to spend the refund leaf.
    pub fn refund_control_block(&self) -> Result<ControlBlock, TaprootError> {
        self.spend_info
            .control_block(&(self.refund_script.clone(), LeafVersion::TapScript))
            .ok_or(TaprootError::MissingControlBlock)
    }

    /// Assemble the witness stack for a refund spend: `[signature, script,
    /// control_block]`.
    pub fn refund_witness(&self, signature: &[u8]) -> Result<Vec<Vec<u8>>, TaprootError> {
        let control_block = self.refund_control_block()?;
        Ok(vec![
            signature.to_vec(),
            self.refund_script.to_bytes(),
            control_block.serialize(),
        ])
    }

    pub fn internal_key(&self) -> XOnlyPublicKey {
        self.internal_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{Keypair, Secp256k1, SecretKey};

    fn key_from_byte(b: u8) -> XOnlyPublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[b; 32]).unwrap();
        let kp = Keypair::from_secret_key(&secp, &sk);
        kp.x_only_public_key().0
    }

    #[test]
    fn builds_a_valid_address_and_merkle_root() {
        let internal = key_from_byte(1);
        let refund = key_from_byte(2).serialize();

        let tree = TaprootScriptTree::build(internal, refund, 144).unwrap();
        let address = tree.address(BitcoinNetwork::Testnet);
        assert!(address.to_string().starts_with("tb1p"));
        // merkle_root() must not panic: exactly one leaf was added.
        let _ = tree.merkle_root();
    }

    #[test]
    fn zero_timelock_is_rejected() {
        let internal = key_from_byte(1);
        let refund = key_from_byte(2).serialize();
        let err = TaprootScriptTree::build(internal, refund, 0).unwrap_err();
        assert!(matches!(err, TaprootError::ZeroTimelock));
    }

    #[test]
    fn refund_witness_has_three_items() {
        let internal = key_from_byte(1);
        let refund = key_from_byte(2).serialize();
        let tree = TaprootScriptTree::build(internal, refund, 144).unwrap();

        let witness = tree.refund_witness(&[0xAB; 64]).unwrap();
        assert_eq!(witness.len(), 3);
        assert_eq!(witness[1], tree.refund_script().to_bytes());
    }
}
