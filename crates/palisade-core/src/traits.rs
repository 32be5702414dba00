//! Collaborator trait definitions for the Palisade decision pipeline.
//!
//! These traits define the complete boundary of the core:
//!
//! - `PolicyStore`   — durable policy storage (consumed)
//! - `CounterStore`  — sliding-window counter state (consumed)
//! - `AuditSink`     — append-only decision record sink (consumed)
//! - `AuditQuery`    — paged read access to stored audit entries (consumed)
//! - `Clock`         — time source (consumed; swappable for tests)
//!
//! The gateway wires them together; everything behind these traits may fail
//! with `InfraFault`, and the pipeline decides — once, at its outermost
//! boundary — whether such a fault becomes a fail-closed block or surfaces
//! to the caller.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use palisade_contracts::{AuditEntry, AuditFilter, AuditPage, GatewayResult};
use palisade_policy::Policy;

/// Durable policy storage, one active policy per project.
///
/// Implementations must make `put` atomic with respect to concurrent `get`
/// calls: a reader sees either the previous active policy or the new one,
/// never a partially installed document. Prior policies are archived, not
/// destroyed.
pub trait PolicyStore: Send + Sync {
    /// Fetch the active policy for a project, or `None` when the project
    /// has no policy configured.
    fn get(&self, project_id: &str) -> GatewayResult<Option<Arc<Policy>>>;

    /// Atomically replace the active policy for a project, archiving the
    /// prior one.
    fn put(&self, project_id: &str, policy: Policy) -> GatewayResult<Arc<Policy>>;
}

/// The result of a conditional sliding-window increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowDecision {
    /// Whether the increment was admitted (and recorded).
    pub admitted: bool,
    /// The in-window total *excluding* the attempted increment.
    pub current: f64,
}

/// Sliding-window counter state, keyed by opaque string.
///
/// Both operations are atomic per key: concurrent callers on the same key
/// observe a total order of admissions. Different keys require no ordering
/// and must not contend on a single global lock.
pub trait CounterStore: Send + Sync {
    /// Conditionally record `weight` at `now` under `key`.
    ///
    /// Entries older than `now - window` are discarded first. If the sum of
    /// the remaining weights plus `weight` would exceed `max`, nothing is
    /// recorded and `admitted` is false; otherwise the entry is recorded.
    fn sliding_increment(
        &self,
        key: &str,
        weight: f64,
        window: Duration,
        max: f64,
        now: DateTime<Utc>,
    ) -> GatewayResult<WindowDecision>;

    /// Best-effort removal of the increment recorded at `now` with `weight`.
    ///
    /// Used to un-consume quota when a later gate refuses the action, and by
    /// simulation to leave no net trace.
    fn rollback(&self, key: &str, weight: f64, now: DateTime<Utc>) -> GatewayResult<()>;
}

/// What became of an appended audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was accepted (possibly queued).
    Accepted,
    /// The entry was discarded under backpressure.
    Dropped,
}

/// Append-only sink for audit entries.
///
/// `append` must not block the caller beyond bounded in-memory work;
/// asynchronous implementations surface backpressure only as `Dropped`
/// outcomes plus an internal counter, never as latency on the decide path.
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    fn append(&self, entry: &AuditEntry) -> GatewayResult<AppendOutcome>;
}

/// Paged read access to stored audit entries.
///
/// Kept separate from [`AuditSink`] because the write path may go through a
/// buffering layer while queries go straight to the store.
pub trait AuditQuery: Send + Sync {
    /// List entries matching `filter`, newest first, with a cursor over
    /// insertion order.
    fn list(&self, filter: &AuditFilter) -> GatewayResult<AuditPage>;
}

/// Time source for the pipeline and the quota engine.
///
/// `now()` must be monotonic within a process; wall-clock drift across
/// processes is tolerated up to a quota window length.
pub trait Clock: Send + Sync {
    /// The current instant (UTC).
    fn now(&self) -> DateTime<Utc>;
}
