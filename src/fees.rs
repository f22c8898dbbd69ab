//! Fee Configuration
//!
//! Maker/taker fees charged to swap participants, split between the DAO
//! treasury and the node operator that ran the swap. See spec.md §3 and
//! invariant (iv): `dao_share_bps + operator_share_bps == 10_000`.

use std::env;

use crate::config::ConfigError;

/// Denominator for basis-point fee math.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Fee configuration for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeConfig {
    pub maker_bps: u64,
    pub taker_bps: u64,
    pub dao_share_bps: u64,
    pub operator_share_bps: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            maker_bps: 10,
            taker_bps: 20,
            dao_share_bps: 5_000,
            operator_share_bps: 5_000,
        }
    }
}

impl FeeConfig {
    /// Load fee overrides from the environment, falling back to defaults.
    /// Rejects a share split that does not sum to 10,000 bps.
    pub fn from_env_or_default() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let maker_bps = env_u64_or("SWAP_MAKER_FEE_BPS", defaults.maker_bps)?;
        let taker_bps = env_u64_or("SWAP_TAKER_FEE_BPS", defaults.taker_bps)?;
        let dao_share_bps = env_u64_or("SWAP_DAO_SHARE_BPS", defaults.dao_share_bps)?;
        let operator_share_bps =
            env_u64_or("SWAP_OPERATOR_SHARE_BPS", defaults.operator_share_bps)?;

        let config = Self {
            maker_bps,
            taker_bps,
            dao_share_bps,
            operator_share_bps,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.dao_share_bps + self.operator_share_bps != BPS_DENOMINATOR {
            return Err(ConfigError::InvalidValue(
                "SWAP_DAO_SHARE_BPS + SWAP_OPERATOR_SHARE_BPS".to_string(),
                format!(
                    "must sum to {BPS_DENOMINATOR}, got {}",
                    self.dao_share_bps + self.operator_share_bps
                ),
            ));
        }
        Ok(())
    }

    /// Total fee charged to the maker side of a swap of `amount`.
    pub fn calculate_maker_fee(&self, amount: u64) -> u64 {
        amount.saturating_mul(self.maker_bps) / BPS_DENOMINATOR
    }

    /// Total fee charged to the taker side of a swap of `amount`.
    pub fn calculate_taker_fee(&self, amount: u64) -> u64 {
        amount.saturating_mul(self.taker_bps) / BPS_DENOMINATOR
    }

    /// The DAO's share of a collected fee.
    pub fn calculate_dao_share(&self, fee: u64) -> u64 {
        fee.saturating_mul(self.dao_share_bps) / BPS_DENOMINATOR
    }

    /// The node operator's share of a collected fee.
    ///
    /// Defined as the remainder rather than its own bps multiplication so
    /// `calculate_dao_share(f) + calculate_node_operator_share(f) == f`
    /// holds exactly even when `f * bps` doesn't divide evenly.
    pub fn calculate_node_operator_share(&self, fee: u64) -> u64 {
        fee - self.calculate_dao_share(fee)
    }
}

fn env_u64_or(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), v)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dao_and_operator_shares_sum_to_fee() {
        let config = FeeConfig::default();
        for fee in [0u64, 1, 7, 1_000, 123_456_789] {
            let dao = config.calculate_dao_share(fee);
            let op = config.calculate_node_operator_share(fee);
            assert_eq!(dao + op, fee);
        }
    }

    #[test]
    fn rejects_invalid_share_split() {
        let bad = FeeConfig {
            dao_share_bps: 6_000,
            operator_share_bps: 5_000,
            ..FeeConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn maker_and_taker_fee_math() {
        let config = FeeConfig::default();
        assert_eq!(config.calculate_maker_fee(1_000_000), 1_000);
        assert_eq!(config.calculate_taker_fee(1_000_000), 2_000);
    }
}
