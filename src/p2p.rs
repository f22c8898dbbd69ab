//! Peer-to-peer swap message schemas (spec.md §6)
//!
//! Wire types exchanged directly between the two counterparties'
//! coordinators, out of band from any chain. Transport (libp2p, a relay
//! server, whatever) is left to the embedding application — these are pure
//! serde payloads, matching how [`crate::persistence`]'s records are pure
//! data with the storage mechanism left to its trait implementations.

use serde::{Deserialize, Serialize};

use crate::coordinator::types::{Role, SwapMethod};

/// Proposes a swap: "I will send `send_amount` of `send_symbol` for
/// `receive_amount` of `receive_symbol`."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferMsg {
    pub trade_id: String,
    pub send_symbol: String,
    pub send_amount: u128,
    pub receive_symbol: String,
    pub receive_amount: u128,
    pub method: SwapMethod,
    pub initiator_role: Role,
}

/// Exchanges each side's public key for key aggregation / HTLC script
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubKeyMsg {
    pub trade_id: String,
    pub symbol: String,
    pub pubkey: [u8; 33],
}

/// Exchanges MuSig2 public nonces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceMsg {
    pub trade_id: String,
    pub symbol: String,
    pub pub_nonce: [u8; 66],
}

/// Announces that a funding transaction has been broadcast for `symbol`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingAnnounceMsg {
    pub trade_id: String,
    pub symbol: String,
    pub txid: String,
    pub vout: u32,
}

/// Exchanges MuSig2 partial signatures over a specific sighash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialSigMsg {
    pub trade_id: String,
    pub symbol: String,
    pub sighash: [u8; 32],
    pub partial_signature: Vec<u8>,
}

/// Reveals the swap secret once one side has claimed on chain, letting the
/// other side claim before its own timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRevealMsg {
    pub trade_id: String,
    pub secret: [u8; 32],
}

/// Every message type exchanged between counterparties, for transports
/// that multiplex a single channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SwapMessage {
    Offer(OfferMsg),
    PubKey(PubKeyMsg),
    Nonce(NonceMsg),
    FundingAnnounce(FundingAnnounceMsg),
    PartialSig(PartialSigMsg),
    SecretReveal(SecretRevealMsg),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_message_round_trips_through_json() {
        let msg = SwapMessage::SecretReveal(SecretRevealMsg {
            trade_id: "trade-1".to_string(),
            secret: [9u8; 32],
        });
        let json = serde_json::to_string(&msg).unwrap();
        let decoded: SwapMessage = serde_json::from_str(&json).unwrap();
        match decoded {
            SwapMessage::SecretReveal(m) => assert_eq!(m.secret, [9u8; 32]),
            _ => panic!("wrong variant"),
        }
    }
}
