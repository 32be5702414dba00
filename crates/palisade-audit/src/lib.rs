//! # palisade-audit
//!
//! Audit storage for the Palisade gateway: an in-memory, SHA-256
//! hash-chained, append-only store with cursor pagination, plus a bounded
//! drop-oldest buffered sink that keeps audit writes off the decide path.
//!
//! ## Overview
//!
//! Every entry commits to its predecessor via its SHA-256 hash. Tampering
//! with any stored entry — even a single field — breaks the chain and is
//! detected by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use palisade_audit::{BufferedAuditSink, InMemoryAuditStore};
//!
//! let store = Arc::new(InMemoryAuditStore::new());
//! let sink = Arc::new(BufferedAuditSink::new(store.clone(), 1024));
//! // Pass `sink` as the gateway's AuditSink and `store` as its AuditQuery.
//! ```

pub mod chain;
pub mod memory;
pub mod queue;

pub use chain::{hash_entry, verify_chain, GENESIS_HASH};
pub use memory::{ChainedEntry, InMemoryAuditStore};
pub use queue::BufferedAuditSink;
