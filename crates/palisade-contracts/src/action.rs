//! Action types submitted to the gateway.
//!
//! An `Action` describes an effectful operation an agent intends to perform.
//! Every field is caller-supplied; the gateway validates the shape but never
//! transforms the content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};

/// Maximum nesting depth accepted in an action's parameter tree.
///
/// Deeper trees are rejected with `InvalidAction` before any policy is
/// consulted, so constraint evaluation always recurses over bounded input.
pub const MAX_PARAM_DEPTH: usize = 32;

/// A caller-supplied description of an intended effectful operation.
///
/// Example: `{project_id: "finbot-123", agent_name: "invoice_agent",
/// action_type: "pay_invoice", params: {"amount": 5000, "currency": "USD"}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// The project whose active policy governs this action.
    pub project_id: String,
    /// Name of the agent performing the action.
    pub agent_name: String,
    /// Discriminant string that policy rules match on (e.g. "pay_invoice").
    pub action_type: String,
    /// Arbitrary JSON parameter tree. Constraints address into it with
    /// dotted paths.
    #[serde(default = "empty_params")]
    pub params: Value,
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Action {
    /// Construct an action with the given identity fields and parameters.
    pub fn new(
        project_id: impl Into<String>,
        agent_name: impl Into<String>,
        action_type: impl Into<String>,
        params: Value,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            agent_name: agent_name.into(),
            action_type: action_type.into(),
            params,
        }
    }

    /// Check the structural requirements on a caller-supplied action.
    ///
    /// Returns `InvalidAction` when an identity field is empty, `params` is
    /// not a JSON object, or the parameter tree exceeds [`MAX_PARAM_DEPTH`].
    pub fn validate(&self) -> GatewayResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(GatewayError::InvalidAction {
                reason: "project_id must be a non-empty string".to_string(),
            });
        }
        if self.agent_name.trim().is_empty() {
            return Err(GatewayError::InvalidAction {
                reason: "agent_name must be a non-empty string".to_string(),
            });
        }
        if self.action_type.trim().is_empty() {
            return Err(GatewayError::InvalidAction {
                reason: "action_type must be a non-empty string".to_string(),
            });
        }
        if !self.params.is_object() {
            return Err(GatewayError::InvalidAction {
                reason: "params must be a JSON object".to_string(),
            });
        }
        if value_depth(&self.params) > MAX_PARAM_DEPTH {
            return Err(GatewayError::InvalidAction {
                reason: format!("params exceed maximum nesting depth of {}", MAX_PARAM_DEPTH),
            });
        }
        Ok(())
    }
}

/// Nesting depth of a JSON value. Scalars count as 1; each container level
/// adds 1. An empty object or array still counts its own level.
fn value_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(value_depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(value_depth).max().unwrap_or(0),
        _ => 1,
    }
}

/// Per-call options for `Gateway::decide`.
#[derive(Debug, Clone, Default)]
pub struct DecideOptions {
    /// Run the full evaluation without recording quota consumption or an
    /// audit entry. The resulting decision carries `simulated = true` and no
    /// `action_id`.
    pub simulate: bool,
    /// Absolute deadline propagated from the caller. Checked before each
    /// outbound store call; an elapsed deadline is treated as an
    /// infrastructure fault.
    pub deadline: Option<DateTime<Utc>>,
}

impl DecideOptions {
    /// Options for a simulated (side-effect-free) decide call.
    pub fn simulated() -> Self {
        Self {
            simulate: true,
            deadline: None,
        }
    }
}
