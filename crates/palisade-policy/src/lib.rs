//! # palisade-policy
//!
//! Policy model, constraint evaluation, and rule matching for the Palisade
//! action-validation gateway.
//!
//! ## Overview
//!
//! A policy is an opaque JSON document validated once into the typed shape
//! in [`model`]. Rule matching ([`matcher::match_action`]) walks candidates
//! in specificity order — literal action types before wildcards — and
//! produces a [`matcher::Verdict`]: allow-pending (quota checks follow), an
//! immediate block with a reason, or the policy default. Constraint
//! evaluation ([`eval`]) is pure and CPU-only; everything that can fail
//! (regex compilation, malformed limits) fails at load time instead.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use palisade_policy::{match_action, Policy, Verdict};
//!
//! let policy = Policy::load(&raw_document)?;
//! match match_action(&policy, "invoice_agent", "pay_invoice", &params) {
//!     Verdict::AllowPending(rule) => { /* apply rule quotas */ }
//!     Verdict::Block { reason } => { /* blocked */ }
//!     Verdict::Default(effect) => { /* no rule matched */ }
//! }
//! ```

pub mod eval;
pub mod matcher;
pub mod model;
pub mod path;
pub mod templates;

pub use eval::{evaluate_constraint, ConstraintOutcome};
pub use matcher::{match_action, Verdict};
pub use model::{AggregateLimit, Constraint, Effect, Policy, Predicate, RateLimit, Rule};
pub use templates::{builtin_templates, template, PolicyTemplate};

// ── Tests ─────────────────────────────────────────────────────────────────────
