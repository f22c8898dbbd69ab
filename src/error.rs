//! Root Error Taxonomy for the Swap Coordinator
//!
//! Aggregates every subsystem's error enum behind one type so callers at the
//! coordinator boundary only ever match on `SwapError`. Each variant keeps
//! its source error via `#[from]` so `?` works across module boundaries.

use thiserror::Error;

use crate::config::ConfigError;
use crate::coordinator::service::CoordinatorError;
use crate::events::EventBusError;
use crate::evm::EvmHtlcError;
use crate::htlc::HtlcError;
use crate::musig2_session::MuSigError;
use crate::persistence::StorageError;
use crate::registry::RegistryError;
use crate::secret::VaultError;
use crate::taproot::TaprootError;
use crate::timeout::TimeoutError;

/// Root error type for the swap coordinator.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("chain registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("timeout calculator error: {0}")]
    TimeoutCalc(#[from] TimeoutError),

    #[error("secret vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("musig2 session error: {0}")]
    MuSig(#[from] MuSigError),

    #[error("taproot script error: {0}")]
    Taproot(#[from] TaprootError),

    #[error("htlc session error: {0}")]
    Htlc(#[from] HtlcError),

    #[error("evm htlc error: {0}")]
    EvmHtlc(#[from] EvmHtlcError),

    #[error("coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out")]
    Timeout,

    #[error("internal invariant violated: {0}")]
    InvariantViolated(String),

    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

impl SwapError {
    /// Protocol-safety errors are fatal: they abort the session and require
    /// manual operator attention per spec.md §7.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SwapError::MuSig(MuSigError::NonceAlreadyUsed)
                | SwapError::MuSig(MuSigError::NonceReuseDetected)
                | SwapError::MuSig(MuSigError::SessionInvalidated)
                | SwapError::MuSig(MuSigError::KeyAggregationFailed(_))
                | SwapError::MuSig(MuSigError::SigningFailed(_))
                | SwapError::MuSig(MuSigError::SignatureVerificationFailed)
                | SwapError::InvariantViolated(_)
                | SwapError::DecodeFailed(_)
        )
    }

    /// I/O and environmental errors on idempotent operations are retried by
    /// the caller; this reports whether that retry is ever legal for this
    /// error kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwapError::Coordinator(CoordinatorError::BackendUnavailable(_))
                | SwapError::Coordinator(CoordinatorError::BackendError(_))
        )
    }

    /// Stable string code, useful for API responses and log filtering.
    pub fn error_code(&self) -> &'static str {
        match self {
            SwapError::Config(_) => "CONFIG_ERROR",
            SwapError::Registry(_) => "REGISTRY_ERROR",
            SwapError::TimeoutCalc(_) => "TIMEOUT_CALC_ERROR",
            SwapError::Vault(_) => "VAULT_ERROR",
            SwapError::MuSig(_) => "MUSIG_ERROR",
            SwapError::Taproot(_) => "TAPROOT_ERROR",
            SwapError::Htlc(_) => "HTLC_ERROR",
            SwapError::EvmHtlc(_) => "EVM_HTLC_ERROR",
            SwapError::Coordinator(_) => "COORDINATOR_ERROR",
            SwapError::Storage(_) => "STORAGE_ERROR",
            SwapError::EventBus(_) => "EVENT_BUS_ERROR",
            SwapError::Cancelled => "CANCELLED",
            SwapError::Timeout => "TIMEOUT",
            SwapError::InvariantViolated(_) => "INVARIANT_VIOLATED",
            SwapError::DecodeFailed(_) => "DECODE_FAILED",
        }
    }
}

/// Result type alias using [`SwapError`].
pub type Result<T> = std::result::Result<T, SwapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_protocol_safety_errors() {
        let err = SwapError::MuSig(MuSigError::SessionInvalidated);
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn backend_errors_are_retryable() {
        let err = SwapError::Coordinator(CoordinatorError::BackendError("timeout".into()));
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
    }
}
