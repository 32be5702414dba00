//! Rule matching: from a policy and an action to a base verdict.
//!
//! Candidates are tried in specificity order (literal action types before
//! wildcards, ties by declaration). For each candidate:
//!
//! - `allowed_agents` acts as a *gate*: an unlisted agent means the rule
//!   simply does not apply, and later rules may still match.
//! - `blocked_agents` acts as a *bar*: a listed agent (or the `"*"`
//!   wildcard, which bars every agent) produces an immediate block.
//! - Constraints are evaluated in order; the first violation blocks.
//! - A clean match returns the rule's effect: allow-pending (quota checks
//!   follow) or an immediate block.
//!
//! No candidate producing a verdict falls through to the policy default.

use serde_json::Value;
use tracing::debug;

use crate::eval::{evaluate_constraint, ConstraintOutcome};
use crate::model::{Effect, Policy, Rule};

/// The intermediate outcome of rule matching, before quota checks.
#[derive(Debug)]
pub enum Verdict<'a> {
    /// A rule matched cleanly with `effect = allow`; rate and aggregate
    /// limits on the rule still need to pass.
    AllowPending(&'a Rule),
    /// A rule (or one of its constraints) refused the action.
    Block {
        /// Human-readable explanation, later surfaced on the decision.
        reason: String,
    },
    /// No rule produced a verdict; the policy default applies.
    Default(Effect),
}

/// Match an action against a policy and produce the base verdict.
pub fn match_action<'a>(
    policy: &'a Policy,
    agent_name: &str,
    action_type: &str,
    params: &Value,
) -> Verdict<'a> {
    for rule in policy.candidates(action_type) {
        // Whitelist gate: a non-listed agent skips the rule entirely.
        if let Some(allowed) = &rule.allowed_agents {
            if !allowed.iter().any(|a| a == agent_name) {
                debug!(
                    rule = %rule.identity,
                    agent = %agent_name,
                    "agent not in allowed_agents, rule skipped"
                );
                continue;
            }
        }

        // Blacklist bar: a listed agent (or "*") is blocked outright.
        if let Some(blocked) = &rule.blocked_agents {
            if blocked.iter().any(|a| a == agent_name || a == "*") {
                return Verdict::Block {
                    reason: format!(
                        "agent '{agent_name}' is blocked for action '{action_type}'"
                    ),
                };
            }
        }

        for (key, constraint) in &rule.constraints {
            if let ConstraintOutcome::Violated { reason } =
                evaluate_constraint(key, constraint, params)
            {
                debug!(rule = %rule.identity, constraint = %key, "constraint violated");
                return Verdict::Block { reason };
            }
        }

        debug!(rule = %rule.identity, effect = ?rule.effect, "rule matched");
        return match rule.effect {
            Effect::Allow => Verdict::AllowPending(rule),
            Effect::Block => Verdict::Block {
                reason: format!(
                    "action '{action_type}' is blocked by policy rule for action type '{}'",
                    rule.action_type
                ),
            },
        };
    }

    debug!(action_type = %action_type, default = ?policy.default, "no rule matched");
    Verdict::Default(policy.default)
}
