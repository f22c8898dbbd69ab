//! Chain Registry (spec.md §4.A)
//!
//! Pure lookup of per-coin, per-network chain parameters. Built once at
//! startup from a fixed table and never mutated afterward — the REDESIGN
//! FLAG in spec.md §9 against mutable global `register`/`set` helpers is
//! addressed by making every override go through [`ChainRegistryBuilder`]
//! instead of a runtime setter on the registry itself.

use std::collections::HashMap;

use thiserror::Error;

use crate::config::Network;
use crate::coordinator::types::SwapMethod;

/// Chain family a coin belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Bitcoin,
    Evm,
    Monero,
    Solana,
}

/// Immutable coin configuration: symbol, family, decimals, supported swap
/// methods (ordered with MuSig2 preferred over HTLC where both are
/// available, per spec.md §3), and min/max tradeable amounts in base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub symbol: String,
    pub family: ChainFamily,
    pub decimals: u32,
    pub supported_methods: Vec<SwapMethod>,
    pub min_amount: u128,
    pub max_amount: u128,
}

impl Coin {
    /// Invariant (v): every tradeable coin supports at least one method.
    pub fn is_tradeable(&self) -> bool {
        !self.supported_methods.is_empty()
    }

    /// The preferred method for this coin — MuSig2 if present, else the
    /// first supported method.
    pub fn preferred_method(&self) -> Option<SwapMethod> {
        if self.supported_methods.contains(&SwapMethod::MuSig2) {
            Some(SwapMethod::MuSig2)
        } else {
            self.supported_methods.first().copied()
        }
    }
}

/// Per-coin, per-network chain parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    /// EVM chain id; meaningless (0) for non-EVM chains.
    pub chain_id: u64,
    /// Bech32 human-readable prefix, for UTXO chains.
    pub bech32_hrp: String,
    pub taproot_support: bool,
    pub avg_block_seconds: u64,
    pub required_confirmations: u32,
    pub explorer_url: String,
}

/// Registry lookup errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("chain {0} does not support taproot")]
    TaprootNotSupported(String),
}

/// Immutable chain registry: `(symbol, network) -> ChainParams`, plus the
/// coin list it was built from.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    coins: HashMap<String, Coin>,
    params: HashMap<(String, Network), ChainParams>,
}

impl ChainRegistry {
    /// Look up chain parameters for `(symbol, network)`.
    pub fn lookup(&self, symbol: &str, network: Network) -> Result<&ChainParams, RegistryError> {
        self.params
            .get(&(symbol.to_string(), network))
            .ok_or_else(|| RegistryError::UnsupportedChain(symbol.to_string()))
    }

    /// Look up the immutable coin configuration for `symbol`.
    pub fn coin(&self, symbol: &str) -> Result<&Coin, RegistryError> {
        self.coins
            .get(symbol)
            .ok_or_else(|| RegistryError::UnsupportedChain(symbol.to_string()))
    }

    /// All coins belonging to `family`.
    pub fn coins_for_family(&self, family: ChainFamily) -> Vec<&Coin> {
        self.coins.values().filter(|c| c.family == family).collect()
    }

    /// Whether `symbol` supports taproot on `network`. Fails with
    /// `UnsupportedChain` if the chain itself isn't registered.
    pub fn supports_taproot(&self, symbol: &str, network: Network) -> Result<bool, RegistryError> {
        Ok(self.lookup(symbol, network)?.taproot_support)
    }

    /// Require taproot support, surfacing `TaprootNotSupported` distinctly
    /// from a plain `UnsupportedChain`.
    pub fn require_taproot(&self, symbol: &str, network: Network) -> Result<(), RegistryError> {
        if self.supports_taproot(symbol, network)? {
            Ok(())
        } else {
            Err(RegistryError::TaprootNotSupported(symbol.to_string()))
        }
    }

    pub fn all_coins(&self) -> impl Iterator<Item = &Coin> {
        self.coins.values()
    }
}

/// Builder for a [`ChainRegistry`], used both at startup (fixed production
/// table) and in tests (scoped overrides) instead of a mutable global
/// registry.
#[derive(Debug, Default)]
pub struct ChainRegistryBuilder {
    coins: HashMap<String, Coin>,
    params: HashMap<(String, Network), ChainParams>,
}

impl ChainRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coin(mut self, coin: Coin) -> Self {
        self.coins.insert(coin.symbol.clone(), coin);
        self
    }

    pub fn with_params(mut self, symbol: impl Into<String>, network: Network, params: ChainParams) -> Self {
        self.params.insert((symbol.into(), network), params);
        self
    }

    pub fn build(self) -> ChainRegistry {
        ChainRegistry {
            coins: self.coins,
            params: self.params,
        }
    }

    /// A small registry covering BTC, LTC and ETH on testnet, used across
    /// this crate's tests and the end-to-end scenarios in spec.md §8.
    pub fn for_tests() -> ChainRegistry {
        Self::new()
            .with_coin(Coin {
                symbol: "BTC".to_string(),
                family: ChainFamily::Bitcoin,
                decimals: 8,
                supported_methods: vec![SwapMethod::MuSig2, SwapMethod::Htlc],
                min_amount: 10_000,
                max_amount: 10_000_000_000,
            })
            .with_params(
                "BTC",
                Network::Testnet,
                ChainParams {
                    chain_id: 0,
                    bech32_hrp: "tb".to_string(),
                    taproot_support: true,
                    avg_block_seconds: 600,
                    required_confirmations: 1,
                    explorer_url: "https://mempool.space/testnet".to_string(),
                },
            )
            .with_coin(Coin {
                symbol: "LTC".to_string(),
                family: ChainFamily::Bitcoin,
                decimals: 8,
                supported_methods: vec![SwapMethod::MuSig2, SwapMethod::Htlc],
                min_amount: 100_000,
                max_amount: 100_000_000_000,
            })
            .with_params(
                "LTC",
                Network::Testnet,
                ChainParams {
                    chain_id: 0,
                    bech32_hrp: "tltc".to_string(),
                    taproot_support: true,
                    avg_block_seconds: 150,
                    required_confirmations: 1,
                    explorer_url: "https://litecoinspace.org/testnet".to_string(),
                },
            )
            .with_coin(Coin {
                symbol: "DOGE".to_string(),
                family: ChainFamily::Bitcoin,
                decimals: 8,
                supported_methods: vec![SwapMethod::Htlc],
                min_amount: 1_000_000,
                max_amount: 1_000_000_000_000,
            })
            .with_params(
                "DOGE",
                Network::Testnet,
                ChainParams {
                    chain_id: 0,
                    bech32_hrp: "".to_string(),
                    taproot_support: false,
                    avg_block_seconds: 60,
                    required_confirmations: 6,
                    explorer_url: "https://sochain.com/DOGETEST".to_string(),
                },
            )
            .with_coin(Coin {
                symbol: "ETH".to_string(),
                family: ChainFamily::Evm,
                decimals: 18,
                supported_methods: vec![SwapMethod::EvmHtlc],
                min_amount: 1_000_000_000_000_000,
                max_amount: 100_000_000_000_000_000_000,
            })
            .with_params(
                "ETH",
                Network::Testnet,
                ChainParams {
                    chain_id: 11_155_111,
                    bech32_hrp: "".to_string(),
                    taproot_support: false,
                    avg_block_seconds: 12,
                    required_confirmations: 3,
                    explorer_url: "https://sepolia.etherscan.io".to_string(),
                },
            )
            .build()
    }
}
