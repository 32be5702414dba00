//! Hash-chain primitives: entry hashing and chain verification.
//!
//! Every stored audit entry commits to its predecessor via SHA-256, making
//! in-memory tampering detectable. Hash input layout (bytes, in order):
//!
//!   1. sequence as 8-byte little-endian
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. canonical JSON of the entry (serde_json, no pretty-printing)

use sha2::{Digest, Sha256};

use palisade_contracts::AuditEntry;

use crate::memory::ChainedEntry;

/// The sentinel `prev_hash` for the first entry of a chain: 64 hex zeros,
/// a value that can never be the SHA-256 of real data.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Compute the SHA-256 hash (lowercase hex) for one chained entry.
///
/// # Panics
///
/// Panics if `entry` cannot be serialized to JSON — which cannot happen for
/// the well-formed `AuditEntry` type.
pub fn hash_entry(sequence: u64, entry: &AuditEntry, prev_hash: &str) -> String {
    let entry_json =
        serde_json::to_vec(entry).expect("AuditEntry must always be serializable to JSON");

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&entry_json);
    hex::encode(hasher.finalize())
}

/// Verify a chain: each entry's `prev_hash` must equal the predecessor's
/// `this_hash` (or [`GENESIS_HASH`] for the first), and each `this_hash`
/// must match the value recomputed from the entry's own fields. An empty
/// chain is valid.
pub fn verify_chain(entries: &[ChainedEntry]) -> bool {
    let mut expected_prev = GENESIS_HASH.to_string();

    for chained in entries {
        if chained.prev_hash != expected_prev {
            return false;
        }
        let recomputed = hash_entry(chained.sequence, &chained.entry, &chained.prev_hash);
        if chained.this_hash != recomputed {
            return false;
        }
        expected_prev = chained.this_hash.clone();
    }

    true
}
