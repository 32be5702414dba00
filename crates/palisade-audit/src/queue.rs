//! Bounded, drop-oldest buffered audit sink.
//!
//! Wraps any [`AuditSink`] with a bounded queue drained by one background
//! thread, keeping audit writes off the decide path. When the queue is
//! full, the *oldest* queued entry is dropped and a counter incremented —
//! `append` itself never blocks. Dropping the sink flushes the queue and
//! joins the worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::warn;

use palisade_contracts::{AuditEntry, GatewayResult};
use palisade_core::{AppendOutcome, AuditSink};

struct QueueState {
    queue: VecDeque<AuditEntry>,
    shutdown: bool,
    /// True while the worker holds a popped entry it has not yet delivered.
    in_flight: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    work_ready: Condvar,
    queue_empty: Condvar,
    capacity: usize,
    dropped: AtomicU64,
    inner: Arc<dyn AuditSink>,
}

/// A bounded asynchronous front for an audit sink.
pub struct BufferedAuditSink {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl BufferedAuditSink {
    /// Buffer up to `capacity` entries in front of `inner`. A capacity of
    /// zero turns the sink into a pure drop counter.
    pub fn new(inner: Arc<dyn AuditSink>, capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                shutdown: false,
                in_flight: false,
            }),
            work_ready: Condvar::new(),
            queue_empty: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
            inner,
        });

        let worker_shared = shared.clone();
        let worker = std::thread::Builder::new()
            .name("palisade-audit-writer".to_string())
            .spawn(move || drain(&worker_shared))
            .expect("failed to spawn audit writer thread");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Entries dropped so far: queue overflow plus inner-sink failures.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Block until every queued entry has been handed to the inner sink.
    pub fn flush(&self) {
        let mut state = self.shared.state.lock().expect("audit queue lock poisoned");
        while !state.queue.is_empty() || state.in_flight {
            state = self
                .shared
                .queue_empty
                .wait(state)
                .expect("audit queue lock poisoned");
        }
    }
}

impl AuditSink for BufferedAuditSink {
    fn append(&self, entry: &AuditEntry) -> GatewayResult<AppendOutcome> {
        if self.shared.capacity == 0 {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(AppendOutcome::Dropped);
        }

        let mut state = self.shared.state.lock().expect("audit queue lock poisoned");
        if state.queue.len() >= self.shared.capacity {
            // Backpressure: sacrifice the oldest queued entry, keep the new one.
            if let Some(evicted) = state.queue.pop_front() {
                warn!(action_id = %evicted.action_id, "audit buffer full, dropped oldest entry");
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        state.queue.push_back(entry.clone());
        drop(state);
        self.shared.work_ready.notify_one();
        Ok(AppendOutcome::Accepted)
    }
}

impl Drop for BufferedAuditSink {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("audit queue lock poisoned");
            state.shutdown = true;
        }
        self.shared.work_ready.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Worker loop: pop, deliver, repeat. On shutdown the remaining queue is
/// drained before exiting.
fn drain(shared: &Shared) {
    loop {
        let next = {
            let mut state = shared.state.lock().expect("audit queue lock poisoned");
            loop {
                if let Some(entry) = state.queue.pop_front() {
                    state.in_flight = true;
                    break Some(entry);
                }
                if state.shutdown {
                    break None;
                }
                state = shared
                    .work_ready
                    .wait(state)
                    .expect("audit queue lock poisoned");
            }
        };

        let Some(entry) = next else {
            shared.queue_empty.notify_all();
            return;
        };

        match shared.inner.append(&entry) {
            Ok(AppendOutcome::Accepted) => {}
            Ok(AppendOutcome::Dropped) => {
                shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                warn!(
                    action_id = %entry.action_id,
                    error = %error,
                    "audit write failed, entry dropped"
                );
                shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut state = shared.state.lock().expect("audit queue lock poisoned");
        state.in_flight = false;
        if state.queue.is_empty() {
            shared.queue_empty.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use palisade_contracts::{generate_action_id, GatewayError};

    use crate::memory::InMemoryAuditStore;

    use super::*;

    fn entry(tag: &str) -> AuditEntry {
        AuditEntry {
            action_id: generate_action_id(),
            project_id: "proj-1".to_string(),
            agent_name: tag.to_string(),
            action_type: "pay_invoice".to_string(),
            params: json!({}),
            allowed: true,
            reason: None,
            policy_version: None,
            execution_time_ms: 0.1,
            timestamp: Utc::now(),
        }
    }

    /// An inner sink the test can stall by holding the gate mutex.
    struct GatedSink {
        gate: Mutex<()>,
        started: AtomicU64,
        delivered: Mutex<Vec<String>>,
    }

    impl GatedSink {
        fn new() -> Self {
            Self {
                gate: Mutex::new(()),
                started: AtomicU64::new(0),
                delivered: Mutex::new(Vec::new()),
            }
        }

        /// Spin until the worker has entered `append` at least `n` times.
        fn wait_for_started(&self, n: u64) {
            let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
            while self.started.load(Ordering::SeqCst) < n {
                assert!(
                    std::time::Instant::now() < deadline,
                    "worker never reached append"
                );
                std::thread::yield_now();
            }
        }
    }

    impl AuditSink for GatedSink {
        fn append(&self, entry: &AuditEntry) -> GatewayResult<AppendOutcome> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let _gate = self.gate.lock().unwrap();
            self.delivered.lock().unwrap().push(entry.agent_name.clone());
            Ok(AppendOutcome::Accepted)
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn append(&self, _entry: &AuditEntry) -> GatewayResult<AppendOutcome> {
            Err(GatewayError::InfraFault {
                reason: "sink unreachable".to_string(),
            })
        }
    }

    #[test]
    fn entries_flow_through_to_the_inner_sink() {
        let store = Arc::new(InMemoryAuditStore::new());
        let sink = BufferedAuditSink::new(store.clone(), 16);

        for tag in ["a", "b", "c"] {
            assert_eq!(sink.append(&entry(tag)).unwrap(), AppendOutcome::Accepted);
        }
        sink.flush();

        assert_eq!(store.len(), 3);
        assert_eq!(sink.dropped(), 0);
        assert!(store.verify_integrity());
    }

    #[test]
    fn overflow_drops_the_oldest_queued_entry() {
        let inner = Arc::new(GatedSink::new());
        let sink = BufferedAuditSink::new(inner.clone(), 2);

        // Stall the worker on the first entry so the queue actually fills.
        let gate = inner.gate.lock().unwrap();
        sink.append(&entry("first")).unwrap();
        // The worker has popped "first" and is blocked on the gate.
        inner.wait_for_started(1);

        sink.append(&entry("second")).unwrap();
        sink.append(&entry("third")).unwrap();
        // Queue is at capacity (second, third); this evicts "second".
        sink.append(&entry("fourth")).unwrap();
        assert_eq!(sink.dropped(), 1);

        drop(gate);
        sink.flush();

        let delivered = inner.delivered.lock().unwrap().clone();
        assert_eq!(delivered, vec!["first", "third", "fourth"]);
    }

    #[test]
    fn zero_capacity_reports_dropped() {
        let store = Arc::new(InMemoryAuditStore::new());
        let sink = BufferedAuditSink::new(store.clone(), 0);
        assert_eq!(sink.append(&entry("a")).unwrap(), AppendOutcome::Dropped);
        assert_eq!(sink.dropped(), 1);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn inner_failures_are_counted_not_surfaced() {
        let sink = BufferedAuditSink::new(Arc::new(FailingSink), 16);
        assert_eq!(sink.append(&entry("a")).unwrap(), AppendOutcome::Accepted);
        assert_eq!(sink.append(&entry("b")).unwrap(), AppendOutcome::Accepted);
        sink.flush();
        assert_eq!(sink.dropped(), 2);
    }

    #[test]
    fn drop_flushes_remaining_entries() {
        let store = Arc::new(InMemoryAuditStore::new());
        {
            let sink = BufferedAuditSink::new(store.clone(), 16);
            for tag in ["a", "b", "c", "d"] {
                sink.append(&entry(tag)).unwrap();
            }
            // No explicit flush: Drop must drain.
        }
        assert_eq!(store.len(), 4);
    }
}
