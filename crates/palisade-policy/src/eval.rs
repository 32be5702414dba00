//! Constraint evaluation against an action's parameter tree.
//!
//! One call evaluates a single `(key, Constraint)` entry. The evaluator is a
//! plain dispatch over the predicate variants — no I/O, no allocation beyond
//! the reason string on failure — so rule matching stays CPU-bound and fast.
//!
//! Absence rules: a path that does not resolve (missing segment or explicit
//! null) violates `min`, `max`, `in`, `equals`, `pattern`, and `contains`,
//! and vacuously satisfies `not_in`, `not_pattern`, and `not_contains` — a
//! value that isn't there cannot appear on a blacklist. Type mismatches are
//! violations, never errors.

use serde_json::Value;

use crate::model::{Constraint, Predicate};
use crate::path::{deep_eq, finite_number, render, render_subject, resolve, truncate};

/// The outcome of evaluating one constraint entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintOutcome {
    /// Every predicate held.
    Satisfied,
    /// A predicate failed; the reason cites the key, the observed value,
    /// and the failing predicate.
    Violated { reason: String },
}

impl ConstraintOutcome {
    /// True when every predicate held.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

/// Evaluate one constraint entry. `key` is the constraint key exactly as it
/// appears in the policy document (reasons echo it unchanged).
pub fn evaluate_constraint(key: &str, constraint: &Constraint, params: &Value) -> ConstraintOutcome {
    let value = resolve(params, key);
    for predicate in &constraint.predicates {
        if let Some(reason) = violation(key, predicate, value) {
            return ConstraintOutcome::Violated { reason };
        }
    }
    ConstraintOutcome::Satisfied
}

fn missing(key: &str, tag: &str) -> String {
    format!("required parameter '{key}' is missing ('{tag}' constraint)")
}

fn not_numeric(key: &str, value: &Value) -> String {
    format!(
        "parameter '{key}' value {} cannot be compared numerically",
        render(value)
    )
}

/// Returns `Some(reason)` when the predicate is violated, `None` when it
/// holds. `value` is `None` for an absent path.
fn violation(key: &str, predicate: &Predicate, value: Option<&Value>) -> Option<String> {
    match predicate {
        Predicate::Min(bound) => {
            let Some(value) = value else {
                return Some(missing(key, "min"));
            };
            match finite_number(value) {
                Some(n) if n >= *bound => None,
                Some(n) => Some(format!(
                    "parameter '{key}' value {n} is below minimum {bound}"
                )),
                None => Some(not_numeric(key, value)),
            }
        }

        Predicate::Max(bound) => {
            let Some(value) = value else {
                return Some(missing(key, "max"));
            };
            match finite_number(value) {
                Some(n) if n <= *bound => None,
                Some(n) => Some(format!(
                    "parameter '{key}' value {n} exceeds maximum {bound}"
                )),
                None => Some(not_numeric(key, value)),
            }
        }

        Predicate::In(allowed) => {
            let Some(value) = value else {
                return Some(missing(key, "in"));
            };
            if allowed.iter().any(|candidate| deep_eq(value, candidate)) {
                None
            } else {
                Some(format!(
                    "parameter '{key}' value {} not in allowed values {}",
                    render(value),
                    truncate(&Value::Array(allowed.clone()).to_string()),
                ))
            }
        }

        Predicate::NotIn(blocked) => {
            // Vacuously satisfied by an absent value.
            let value = value?;
            if blocked.iter().any(|candidate| deep_eq(value, candidate)) {
                Some(format!(
                    "parameter '{key}' value {} is blocked",
                    render(value)
                ))
            } else {
                None
            }
        }

        Predicate::Equals(expected) => {
            let Some(value) = value else {
                return Some(missing(key, "equals"));
            };
            if deep_eq(value, expected) {
                None
            } else {
                Some(format!(
                    "parameter '{key}' value {} must equal {}",
                    render(value),
                    render(expected),
                ))
            }
        }

        Predicate::Pattern(regex) => {
            let Some(value) = value else {
                return Some(missing(key, "pattern"));
            };
            match value {
                Value::String(s) if regex.is_match(s) => None,
                Value::String(s) => Some(format!(
                    "parameter '{key}' value \"{}\" does not match pattern '{}'",
                    truncate(s),
                    regex.as_str(),
                )),
                other => Some(format!(
                    "parameter '{key}' value {} is not a string ('pattern' constraint)",
                    render(other)
                )),
            }
        }

        Predicate::NotPattern { regex, reason } => {
            // Screening predicate: inspects whatever is there; absent passes.
            let value = value?;
            let subject = render_subject(value);
            if regex.is_match(&subject) {
                Some(match reason {
                    Some(custom) => format!("parameter '{key}': {custom}"),
                    None => format!(
                        "parameter '{key}': pattern '{}' is not allowed",
                        regex.as_str()
                    ),
                })
            } else {
                None
            }
        }

        Predicate::Contains(needle) => {
            let Some(value) = value else {
                return Some(missing(key, "contains"));
            };
            if render_subject(value).contains(needle) {
                None
            } else {
                Some(format!("parameter '{key}' must contain '{needle}'"))
            }
        }

        Predicate::NotContains(needle) => {
            let value = value?;
            if render_subject(value).contains(needle) {
                Some(format!("parameter '{key}' must not contain '{needle}'"))
            } else {
                None
            }
        }
    }
}
