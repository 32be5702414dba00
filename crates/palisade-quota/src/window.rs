//! The sliding-window counter algorithm.
//!
//! A window is a list of `(timestamp, weight)` entries. Every operation
//! first drops entries at or before `now - window` (an event exactly at the
//! boundary is excluded; one microsecond later is included), then sums the
//! remaining weights. A conditional increment refuses — recording nothing —
//! when the sum plus the new weight would exceed the limit. Eviction is
//! lazy: entries persist until an operation on the same key prunes them.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use palisade_core::WindowDecision;

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    at: DateTime<Utc>,
    weight: f64,
}

/// Counter state for a single key.
#[derive(Debug, Default)]
pub struct SlidingWindow {
    /// Entries in recording order. Timestamps are non-decreasing because a
    /// key's operations are serialized by the store.
    entries: VecDeque<WindowEntry>,
}

impl SlidingWindow {
    /// An empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Conditionally record `weight` at `now`.
    pub fn try_increment(
        &mut self,
        weight: f64,
        window: Duration,
        max: f64,
        now: DateTime<Utc>,
    ) -> WindowDecision {
        self.prune(now - window);
        let current: f64 = self.entries.iter().map(|e| e.weight).sum();
        if current + weight > max {
            return WindowDecision {
                admitted: false,
                current,
            };
        }
        self.entries.push_back(WindowEntry { at: now, weight });
        WindowDecision {
            admitted: true,
            current,
        }
    }

    /// Remove the most recent entry recorded at `now` with `weight`, if
    /// any. Best-effort: no match is not an error.
    pub fn rollback(&mut self, weight: f64, now: DateTime<Utc>) {
        if let Some(position) = self
            .entries
            .iter()
            .rposition(|e| e.at == now && e.weight == weight)
        {
            let _ = self.entries.remove(position);
        }
    }

    /// The in-window total at `now`, without recording anything. Prunes as
    /// a side effect.
    pub fn total(&mut self, window: Duration, now: DateTime<Utc>) -> f64 {
        self.prune(now - window);
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Entries currently held (pruned or not); used to observe lazy
    /// eviction.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while let Some(front) = self.entries.front() {
            if front.at <= cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }
}
