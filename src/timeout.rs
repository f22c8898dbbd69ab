//! Timeout Calculator (spec.md §4.B)
//!
//! Timeouts for consensus-critical decisions are expressed in blocks, never
//! wall-clock seconds — only the UX-facing time estimate converts to
//! seconds. Policy: the initiator's lock must be at least 2x the
//! responder's, and the safety margin must cover at least one hour of
//! blocks on each chain.

use thiserror::Error;

/// Timeout policy violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("initiator timeout {initiator} must be at least 2x responder timeout {responder}")]
    InitiatorLockTooShort { initiator: u32, responder: u32 },

    #[error("safety margin {margin} blocks is below the minimum of {minimum} blocks for this chain")]
    SafetyMarginTooSmall { margin: u32, minimum: u32 },
}

/// One hour in seconds, used to derive the minimum safety margin in blocks.
const ONE_HOUR_SECS: u64 = 3_600;

/// Chain heights arrive as `u64` from `ChainBackend::current_height` and
/// from `EvmHtlcSession::timeout_height`; the calculator itself works in
/// `u32` blocks. Saturate rather than wrap so an implausibly large height
/// reads as "far past timeout" instead of wrapping around to "not yet due".
pub fn saturating_height(height: u64) -> u32 {
    u32::try_from(height).unwrap_or(u32::MAX)
}

/// Pure, allocation-free timeout arithmetic. Holds no state — every method
/// is a function of its arguments, matching spec.md §5's "pure operations
/// never block."
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutCalculator;

impl TimeoutCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Minimum safety margin, in blocks, to cover at least one hour.
    pub fn minimum_safety_margin_blocks(&self, avg_block_seconds: u64) -> u32 {
        if avg_block_seconds == 0 {
            return 0;
        }
        (ONE_HOUR_SECS.div_ceil(avg_block_seconds)) as u32
    }

    /// `true` iff `current_height + safety_margin < timeout_height`.
    /// Past timeout is never safe, and the comparison is strict: sitting
    /// exactly at the margin boundary is not safe either.
    pub fn is_safe_to_complete(&self, current_height: u32, timeout_height: u32, safety_margin: u32) -> bool {
        match current_height.checked_add(safety_margin) {
            Some(threshold) => threshold < timeout_height,
            None => false,
        }
    }

    /// Blocks remaining until `timeout_height`, saturating at zero once
    /// past timeout.
    pub fn blocks_until_timeout(&self, current_height: u32, timeout_height: u32) -> u32 {
        timeout_height.saturating_sub(current_height)
    }

    /// Wall-clock estimate (seconds) until timeout, for UX display only —
    /// never used for a consensus-critical decision.
    pub fn estimate_time_until_timeout(&self, current_height: u32, timeout_height: u32, avg_block_seconds: u64) -> u64 {
        self.blocks_until_timeout(current_height, timeout_height) as u64 * avg_block_seconds
    }

    /// Validate the initiator/responder lock pairing and safety margin
    /// against spec.md §3 invariant (iii) and the policy in §4.B. Returns
    /// an error rather than silently accepting a racy configuration.
    pub fn validate_lock_policy(
        &self,
        initiator_timeout_blocks: u32,
        responder_timeout_blocks: u32,
        safety_margin_blocks: u32,
        avg_block_seconds: u64,
    ) -> Result<(), TimeoutError> {
        if initiator_timeout_blocks < responder_timeout_blocks.saturating_mul(2) {
            return Err(TimeoutError::InitiatorLockTooShort {
                initiator: initiator_timeout_blocks,
                responder: responder_timeout_blocks,
            });
        }

        let minimum = self.minimum_safety_margin_blocks(avg_block_seconds);
        if safety_margin_blocks < minimum {
            return Err(TimeoutError::SafetyMarginTooSmall {
                margin: safety_margin_blocks,
                minimum,
            });
        }

        if initiator_timeout_blocks <= responder_timeout_blocks + safety_margin_blocks {
            return Err(TimeoutError::InitiatorLockTooShort {
                initiator: initiator_timeout_blocks,
                responder: responder_timeout_blocks + safety_margin_blocks,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_safe_to_complete_implies_strict_inequality() {
        let calc = TimeoutCalculator::new();
        for (h, t, m) in [(100u32, 200u32, 10u32), (0, 1, 0), (50, 1000, 500)] {
            if calc.is_safe_to_complete(h, t, m) {
                assert!(h + m < t);
            }
        }
    }

    #[test]
    fn past_timeout_is_never_safe() {
        let calc = TimeoutCalculator::new();
        assert!(!calc.is_safe_to_complete(1000, 900, 0));
        assert!(!calc.is_safe_to_complete(1000, 1000, 0));
    }

    #[test]
    fn blocks_until_timeout_saturates() {
        let calc = TimeoutCalculator::new();
        assert_eq!(calc.blocks_until_timeout(1000, 900), 0);
        assert_eq!(calc.blocks_until_timeout(100, 900), 800);
    }

    #[test]
    fn estimate_time_multiplies_blocks_by_avg_block_seconds() {
        let calc = TimeoutCalculator::new();
        assert_eq!(calc.estimate_time_until_timeout(0, 10, 600), 6_000);
    }

    #[test]
    fn lock_policy_rejects_short_initiator_lock() {
        let calc = TimeoutCalculator::new();
        let err = calc
            .validate_lock_policy(100, 100, 10, 600)
            .unwrap_err();
        assert!(matches!(err, TimeoutError::InitiatorLockTooShort { .. }));
    }

    #[test]
    fn lock_policy_accepts_valid_btc_ltc_pairing() {
        let calc = TimeoutCalculator::new();
        // 48h initiator on BTC (~432 blocks) vs 24h responder on LTC (~576 blocks at 150s)
        // use block counts directly, not cross-chain wall clock
        assert!(calc
            .validate_lock_policy(1000, 400, 10, 600)
            .is_ok());
    }

    #[test]
    fn minimum_safety_margin_covers_one_hour() {
        let calc = TimeoutCalculator::new();
        assert_eq!(calc.minimum_safety_margin_blocks(600), 6);
        assert_eq!(calc.minimum_safety_margin_blocks(150), 24);
    }
}
