//! The decision value returned by the gateway.
//!
//! `ActionBlocked` is an ordinary outcome, not an error: a blocked action
//! produces a `Decision` with `allowed = false` and a reason, never an `Err`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The final output of the decision pipeline for one action.
///
/// Invariants maintained by the constructors:
/// - `allowed == true` ⇔ `reason` is `None`
/// - `action_id` is `None` only for simulated decisions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Globally unique identifier for this decision (`act_` + 16 hex chars).
    /// `None` only for simulations.
    pub action_id: Option<String>,
    /// Wall-clock time (UTC) the decision was produced.
    pub timestamp: DateTime<Utc>,
    /// Single-sentence explanation of a block. Present iff `allowed` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Version of the policy consulted, or `None` when the project has no
    /// configured policy.
    pub policy_version: Option<String>,
    /// Wall-clock duration of the decide call, fractional milliseconds.
    pub execution_time_ms: f64,
    /// True when the call ran in simulation mode (no audit, no quota).
    pub simulated: bool,
}

impl Decision {
    /// Build an allowed decision. Allowed decisions never carry a reason.
    pub fn allowed(
        action_id: Option<String>,
        timestamp: DateTime<Utc>,
        policy_version: Option<String>,
        execution_time_ms: f64,
        simulated: bool,
    ) -> Self {
        Self {
            allowed: true,
            action_id,
            timestamp,
            reason: None,
            policy_version,
            execution_time_ms,
            simulated,
        }
    }

    /// Build a blocked decision. The reason must be non-empty; an empty
    /// reason is replaced with a generic one rather than violating the
    /// blocked-implies-reason invariant.
    pub fn blocked(
        reason: impl Into<String>,
        action_id: Option<String>,
        timestamp: DateTime<Utc>,
        policy_version: Option<String>,
        execution_time_ms: f64,
        simulated: bool,
    ) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            "action blocked by policy".to_string()
        } else {
            reason
        };
        Self {
            allowed: false,
            action_id,
            timestamp,
            reason: Some(reason),
            policy_version,
            execution_time_ms,
            simulated,
        }
    }
}
