//! In-memory, hash-chained audit store.
//!
//! The reference implementation of both `AuditSink` (append) and
//! `AuditQuery` (paged reads, newest first). Entries live in a `Vec`
//! behind a `Mutex`; each append assigns the next sequence number and links
//! the entry into the SHA-256 chain.

use std::sync::Mutex;

use palisade_contracts::{
    AuditEntry, AuditFilter, AuditPage, AuditRecord, GatewayError, GatewayResult,
};
use palisade_core::{AppendOutcome, AuditQuery, AuditSink};

use crate::chain::{hash_entry, verify_chain, GENESIS_HASH};

/// One audit entry wrapped with its chain position and hashes.
#[derive(Debug, Clone)]
pub struct ChainedEntry {
    /// Insertion position, starting at 0. Doubles as the query cursor.
    pub sequence: u64,
    /// The immutable audit entry.
    pub entry: AuditEntry,
    /// `this_hash` of the previous entry, or [`GENESIS_HASH`].
    pub prev_hash: String,
    /// SHA-256 (hex) of this entry's canonical content.
    pub this_hash: String,
}

struct StoreState {
    entries: Vec<ChainedEntry>,
    sequence: u64,
    last_hash: String,
}

/// An in-memory, append-only audit store backed by a SHA-256 hash chain.
///
/// # Thread safety
///
/// `append` and `list` both acquire an internal `Mutex`; the store is
/// shared behind an `Arc` between the decide path (writes) and the
/// administrative query path (reads).
pub struct InMemoryAuditStore {
    state: Mutex<StoreState>,
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                entries: Vec::new(),
                sequence: 0,
                last_hash: GENESIS_HASH.to_string(),
            }),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.state.lock().expect("audit state lock poisoned").entries.len()
    }

    /// True when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify that the stored chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock().expect("audit state lock poisoned");
        verify_chain(&state.entries)
    }

    #[cfg(test)]
    pub(crate) fn tamper_with(&self, index: usize, mutate: impl FnOnce(&mut AuditEntry)) {
        let mut state = self.state.lock().unwrap();
        mutate(&mut state.entries[index].entry);
    }
}

impl AuditSink for InMemoryAuditStore {
    /// Append one entry to the chain.
    ///
    /// Returns `Err(InfraFault)` only if the internal mutex is poisoned,
    /// which cannot happen under normal operation.
    fn append(&self, entry: &AuditEntry) -> GatewayResult<AppendOutcome> {
        let mut state = self.state.lock().map_err(|e| GatewayError::InfraFault {
            reason: format!("audit state lock poisoned: {e}"),
        })?;

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let this_hash = hash_entry(sequence, entry, &prev_hash);

        state.entries.push(ChainedEntry {
            sequence,
            entry: entry.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        Ok(AppendOutcome::Accepted)
    }
}

impl AuditQuery for InMemoryAuditStore {
    /// Page over matching entries, newest first. The filter's cursor is an
    /// exclusive upper bound on the sequence; `next_cursor` is present iff
    /// older matching entries remain.
    fn list(&self, filter: &AuditFilter) -> GatewayResult<AuditPage> {
        let state = self.state.lock().map_err(|e| GatewayError::InfraFault {
            reason: format!("audit state lock poisoned: {e}"),
        })?;

        let upper = filter.cursor.unwrap_or(u64::MAX);
        let matches = |entry: &AuditEntry| {
            entry.project_id == filter.project_id
                && filter
                    .agent_name
                    .as_ref()
                    .is_none_or(|a| &entry.agent_name == a)
                && filter
                    .action_type
                    .as_ref()
                    .is_none_or(|t| &entry.action_type == t)
                && filter.allowed.is_none_or(|a| entry.allowed == a)
        };

        let mut matching: Vec<&ChainedEntry> = state
            .entries
            .iter()
            .filter(|chained| chained.sequence < upper && matches(&chained.entry))
            .collect();
        matching.reverse();

        let limit = filter.effective_limit();
        let has_more = matching.len() > limit;
        let records: Vec<AuditRecord> = matching
            .into_iter()
            .take(limit)
            .map(|chained| AuditRecord {
                sequence: chained.sequence,
                entry: chained.entry.clone(),
            })
            .collect();
        let next_cursor = if has_more {
            records.last().map(|record| record.sequence)
        } else {
            None
        };

        Ok(AuditPage {
            records,
            next_cursor,
        })
    }
}
