//! In-memory implementation of [`CounterStore`].
//!
//! One [`SlidingWindow`] per key inside a `DashMap`. The entry API holds a
//! per-shard write lock for the duration of an operation, which serializes
//! concurrent callers on the same key — the prune/sum/append sequence is
//! observed as a single step — while leaving keys on other shards free.
//! There is no global lock.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use palisade_contracts::GatewayResult;
use palisade_core::{CounterStore, WindowDecision};

use crate::window::SlidingWindow;

/// An in-memory, per-process counter store.
///
/// Counts are exact within the process. In a multi-process deployment each
/// process counts independently, which is the documented approximation for
/// the local backend.
#[derive(Default)]
pub struct InMemoryCounterStore {
    windows: DashMap<String, SlidingWindow>,
}

impl InMemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The in-window total for a key at `now`. Test and introspection
    /// helper; not part of the `CounterStore` contract.
    pub fn window_total(&self, key: &str, window: Duration, now: DateTime<Utc>) -> f64 {
        self.windows
            .get_mut(key)
            .map(|mut w| w.total(window, now))
            .unwrap_or(0.0)
    }
}

impl CounterStore for InMemoryCounterStore {
    fn sliding_increment(
        &self,
        key: &str,
        weight: f64,
        window: Duration,
        max: f64,
        now: DateTime<Utc>,
    ) -> GatewayResult<WindowDecision> {
        let mut entry = self.windows.entry(key.to_string()).or_default();
        Ok(entry.try_increment(weight, window, max, now))
    }

    fn rollback(&self, key: &str, weight: f64, now: DateTime<Utc>) -> GatewayResult<()> {
        if let Some(mut entry) = self.windows.get_mut(key) {
            entry.rollback(weight, now);
        }
        Ok(())
    }
}
