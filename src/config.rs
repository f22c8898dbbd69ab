//! Environment-based Configuration for the Swap Coordinator
//!
//! Configuration is read once at process start and passed around as a
//! shared read-only handle, never mutated afterward — per spec.md §9's
//! REDESIGN FLAG against mutable global registries.
//!
//! # Recognized environment variables
//!
//! - `SWAP_NETWORK` — "mainnet" or "testnet" (default: "testnet")
//! - `SWAP_DAO_FEE_ADDRESS` — payout address for the DAO's fee share
//! - `SWAP_OPERATOR_FEE_ADDRESS` — payout address for the node operator's share
//! - `SWAP_MAKER_FEE_BPS` / `SWAP_TAKER_FEE_BPS` — fee overrides
//! - `SWAP_EVM_CONTRACT_<CHAIN_ID>` — deployed HTLC contract address for a chain id
//! - `SWAP_LOG_LEVEL` — tracing level (trace, debug, info, warn, error)
//! - `SWAP_LOG_JSON` — "1" to emit JSON logs instead of pretty text

use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::fees::FeeConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Network environment the coordinator runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// The corresponding `bitcoin`-crate network, for address encoding.
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
        }
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(ConfigError::InvalidValue(
                "SWAP_NETWORK".to_string(),
                format!("unknown network: {other}"),
            )),
        }
    }
}

/// Top-level coordinator configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub network: Network,
    pub fees: FeeConfig,
    pub dao_fee_address: Option<String>,
    pub operator_fee_address: Option<String>,
    /// chain-id -> deployed HTLC contract address, for EVM chains.
    pub evm_contract_registry: HashMap<u64, String>,
    pub log_level: String,
    pub log_json: bool,
}

impl CoordinatorConfig {
    /// Load configuration from environment variables, falling back to safe
    /// testnet defaults for anything not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let network: Network = env::var("SWAP_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .parse()?;

        let fees = FeeConfig::from_env_or_default()?;

        let dao_fee_address = env::var("SWAP_DAO_FEE_ADDRESS").ok();
        let operator_fee_address = env::var("SWAP_OPERATOR_FEE_ADDRESS").ok();

        let mut evm_contract_registry = HashMap::new();
        for (key, value) in env::vars() {
            if let Some(chain_id_str) = key.strip_prefix("SWAP_EVM_CONTRACT_") {
                let chain_id: u64 = chain_id_str.parse().map_err(|_| {
                    ConfigError::InvalidValue(key.clone(), "chain id must be numeric".to_string())
                })?;
                evm_contract_registry.insert(chain_id, value);
            }
        }

        let log_level = env::var("SWAP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = env::var("SWAP_LOG_JSON").map(|v| v == "1").unwrap_or(false);

        Ok(Self {
            network,
            fees,
            dao_fee_address,
            operator_fee_address,
            evm_contract_registry,
            log_level,
            log_json,
        })
    }

    /// A configuration suitable for tests: testnet, default fees, no
    /// registered EVM contracts.
    pub fn for_tests() -> Self {
        Self {
            network: Network::Testnet,
            fees: FeeConfig::default(),
            dao_fee_address: None,
            operator_fee_address: None,
            evm_contract_registry: HashMap::new(),
            log_level: "debug".to_string(),
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parses_aliases() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("test".parse::<Network>().unwrap(), Network::Testnet);
        assert!("wat".parse::<Network>().is_err());
    }

    #[test]
    fn test_config_has_no_evm_contracts() {
        let cfg = CoordinatorConfig::for_tests();
        assert!(cfg.evm_contract_registry.is_empty());
    }
}
