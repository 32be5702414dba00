//! # palisade-core
//!
//! The decision pipeline of the Palisade action-validation gateway.
//!
//! This crate provides:
//! - The collaborator traits (`PolicyStore`, `CounterStore`, `AuditSink`,
//!   `AuditQuery`, `Clock`)
//! - The quota engine that orders request and aggregate limit checks
//! - The TTL-bounded policy cache
//! - The `Gateway` that wires everything into `decide` / `upsert_policy` /
//!   `get_active_policy` / `list_audit`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use palisade_core::{Gateway, GatewayConfig, SystemClock, InMemoryPolicyStore};
//!
//! let gateway = Gateway::new(
//!     Arc::new(InMemoryPolicyStore::new()),
//!     counter_store,
//!     audit_sink,
//!     audit_query,
//!     Arc::new(SystemClock),
//!     GatewayConfig::default(),
//! );
//! let decision = gateway.decide(&action, &Default::default())?;
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod policy_store;
pub mod quota;
pub mod traits;

pub use cache::PolicyCache;
pub use clock::{ManualClock, SystemClock};
pub use config::{CounterBackend, GatewayConfig, DEFAULT_FAIL_CLOSED_REASON};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use pipeline::Gateway;
pub use policy_store::InMemoryPolicyStore;
pub use quota::{QuotaEngine, QuotaOutcome};
pub use traits::{AppendOutcome, AuditQuery, AuditSink, Clock, CounterStore, PolicyStore, WindowDecision};
