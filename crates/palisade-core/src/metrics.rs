//! Process-wide decision counters.
//!
//! Plain atomics, readable as a consistent-enough snapshot. The enclosing
//! service is free to export these into whatever metrics system it runs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the gateway.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    decisions: AtomicU64,
    allowed: AtomicU64,
    blocked: AtomicU64,
    simulated: AtomicU64,
    audit_dropped: AtomicU64,
    fail_closed: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Decisions produced, simulated ones included.
    pub decisions: u64,
    /// Allowed decisions.
    pub allowed: u64,
    /// Blocked decisions.
    pub blocked: u64,
    /// Simulated decisions.
    pub simulated: u64,
    /// Audit entries dropped (sink backpressure or sink failure).
    pub audit_dropped: u64,
    /// Blocked decisions produced by fail-closed handling.
    pub fail_closed: u64,
}

impl GatewayMetrics {
    /// Count one produced decision.
    pub fn record_decision(&self, allowed: bool, simulated: bool) {
        self.decisions.fetch_add(1, Ordering::Relaxed);
        if allowed {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.blocked.fetch_add(1, Ordering::Relaxed);
        }
        if simulated {
            self.simulated.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count one audit entry that did not make it into the store.
    pub fn record_audit_dropped(&self) {
        self.audit_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one fail-closed block.
    pub fn record_fail_closed(&self) {
        self.fail_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            decisions: self.decisions.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            simulated: self.simulated.load(Ordering::Relaxed),
            audit_dropped: self.audit_dropped.load(Ordering::Relaxed),
            fail_closed: self.fail_closed.load(Ordering::Relaxed),
        }
    }
}
