//! Error types for the Palisade gateway.
//!
//! A blocked action is NOT an error — it is a `Decision` value. The variants
//! here cover everything else: malformed policy documents, invalid caller
//! input, and infrastructure faults. Intermediate pipeline stages propagate
//! these unchanged; the pipeline applies fail-closed handling once, at its
//! outermost boundary.

use thiserror::Error;

/// The unified error type for the gateway core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A policy document failed validation at load time.
    ///
    /// Only produced by `upsert_policy`; a policy already installed can
    /// never raise this on the decide path.
    #[error("malformed policy: {reason}")]
    PolicyMalformed { reason: String },

    /// A caller-supplied action failed structural validation.
    #[error("invalid action: {reason}")]
    InvalidAction { reason: String },

    /// A backing store (policy, counter, or audit) failed or was
    /// unreachable. Subject to fail-closed handling on the decide path.
    #[error("infrastructure fault: {reason}")]
    InfraFault { reason: String },

    /// The caller's deadline elapsed while waiting on a backing store.
    /// Treated exactly like an infrastructure fault.
    #[error("deadline exceeded: {reason}")]
    DeadlineExceeded { reason: String },

    /// An engine invariant was violated. Logged distinctly, surfaced to
    /// callers like an infrastructure fault.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl GatewayError {
    /// True for the kinds the decide path maps through fail-closed handling:
    /// store faults, elapsed deadlines, and internal invariant violations.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::InfraFault { .. } | Self::DeadlineExceeded { .. } | Self::Internal { .. }
        )
    }
}

/// Convenience alias used throughout the Palisade crates.
pub type GatewayResult<T> = Result<T, GatewayError>;
