//! Audit entry, query filter, and page types.
//!
//! One `AuditEntry` is produced for every non-simulated decide call,
//! regardless of the allow/block outcome. Entries are append-only; queries
//! page over insertion order, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{action::Action, decision::Decision};

/// Default number of entries returned by an audit query.
pub const DEFAULT_AUDIT_PAGE_SIZE: usize = 50;

/// Upper bound on the page size a single query may request.
pub const MAX_AUDIT_PAGE_SIZE: usize = 100;

/// Generate a fresh, globally unique action identifier.
///
/// Format: `act_` followed by 16 lowercase hex characters.
pub fn generate_action_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("act_{}", &hex[..16])
}

/// An action extended with the fields of its decision — the immutable
/// record written to the audit sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The decision's globally unique id.
    pub action_id: String,
    /// Project the action was submitted under.
    pub project_id: String,
    /// Agent that attempted the action.
    pub agent_name: String,
    /// The attempted action type.
    pub action_type: String,
    /// The full parameter tree as submitted.
    pub params: Value,
    /// Whether the action was allowed.
    pub allowed: bool,
    /// Block reason, if the action was blocked.
    pub reason: Option<String>,
    /// Version of the policy consulted, if any.
    pub policy_version: Option<String>,
    /// Decide-call duration in fractional milliseconds.
    pub execution_time_ms: f64,
    /// When the decision was produced (UTC).
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Combine an action and its (non-simulated) decision into one record.
    ///
    /// # Panics
    ///
    /// Panics if the decision carries no `action_id`. Simulated decisions
    /// are never audited, so every audited decision has one.
    pub fn record(action: &Action, decision: &Decision) -> Self {
        let action_id = decision
            .action_id
            .clone()
            .expect("audited decisions always carry an action_id");
        Self {
            action_id,
            project_id: action.project_id.clone(),
            agent_name: action.agent_name.clone(),
            action_type: action.action_type.clone(),
            params: action.params.clone(),
            allowed: decision.allowed,
            reason: decision.reason.clone(),
            policy_version: decision.policy_version.clone(),
            execution_time_ms: decision.execution_time_ms,
            timestamp: decision.timestamp,
        }
    }
}

/// An audit entry together with the insertion sequence the store assigned
/// to it. The sequence doubles as the pagination cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonically increasing insertion position, starting at 0.
    pub sequence: u64,
    /// The stored entry.
    pub entry: AuditEntry,
}

/// Query filter for audit listings.
///
/// `cursor` is an exclusive upper bound on the insertion sequence: the first
/// page passes `None`, subsequent pages pass the `next_cursor` of the
/// previous page. Results are returned newest-first.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    /// Project whose entries are listed. Required.
    pub project_id: String,
    /// Restrict to one agent.
    pub agent_name: Option<String>,
    /// Restrict to one action type.
    pub action_type: Option<String>,
    /// Restrict to allowed (`Some(true)`) or blocked (`Some(false)`) entries.
    pub allowed: Option<bool>,
    /// Exclusive upper bound on the insertion sequence.
    pub cursor: Option<u64>,
    /// Maximum entries to return; clamped to [`MAX_AUDIT_PAGE_SIZE`].
    pub limit: usize,
}

impl AuditFilter {
    /// A filter selecting every entry of one project, first page, default
    /// page size.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            agent_name: None,
            action_type: None,
            allowed: None,
            cursor: None,
            limit: DEFAULT_AUDIT_PAGE_SIZE,
        }
    }

    /// The effective page size after clamping.
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_AUDIT_PAGE_SIZE)
    }
}

/// One page of audit records, newest first.
#[derive(Debug, Clone)]
pub struct AuditPage {
    /// The records on this page, descending by sequence.
    pub records: Vec<AuditRecord>,
    /// Cursor for the next page, or `None` when this page is the last.
    pub next_cursor: Option<u64>,
}
