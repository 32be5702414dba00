//! Quota gating for a matched rule: request limit, then aggregate limit.
//!
//! Ordering is load-bearing. The request limit is checked first; if it
//! refuses, the aggregate counter is never touched. If the request limit
//! admits but the aggregate refuses — or the aggregate check faults — the
//! request increment is rolled back, so a blocked action never consumes any
//! quota. Simulation runs the same increments and rolls them all back,
//! leaving no net trace in the store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use palisade_contracts::{Action, GatewayResult};
use palisade_policy::path::numeric_at;
use palisade_policy::Rule;

use crate::traits::CounterStore;

/// The quota engine's answer for one matched rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaOutcome {
    /// All limits on the rule admitted the action.
    Admitted,
    /// A limit refused; the reason names the limit and the observed totals.
    Refused { reason: String },
}

/// Applies a matched rule's rate and aggregate limits against a counter
/// store.
pub struct QuotaEngine {
    store: Arc<dyn CounterStore>,
}

impl QuotaEngine {
    /// Wrap a counter store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Counter key for the per-(project, agent, action) request limit.
    pub fn request_key(action: &Action) -> String {
        format!(
            "rate:{}:{}:{}",
            action.project_id, action.agent_name, action.action_type
        )
    }

    /// Counter key for the per-(project, rule) aggregate limit.
    pub fn aggregate_key(project_id: &str, rule_identity: &str) -> String {
        format!("agg:{project_id}:{rule_identity}")
    }

    /// Check the rule's limits for this action at `now`.
    ///
    /// With `simulate` set, admitted increments are rolled back before
    /// returning so the call is side-effect free either way.
    pub fn check(
        &self,
        action: &Action,
        rule: &Rule,
        now: DateTime<Utc>,
        simulate: bool,
    ) -> GatewayResult<QuotaOutcome> {
        let mut recorded: Vec<(String, f64)> = Vec::new();

        if let Some(limit) = &rule.rate_limit {
            let key = Self::request_key(action);
            let window = Duration::seconds(limit.window_seconds as i64);
            let decision =
                self.store
                    .sliding_increment(&key, 1.0, window, limit.max_requests as f64, now)?;
            if !decision.admitted {
                return Ok(QuotaOutcome::Refused {
                    reason: format!(
                        "rate limit exceeded ({}/{} in last {} seconds)",
                        decision.current as u64, limit.max_requests, limit.window_seconds
                    ),
                });
            }
            recorded.push((key, 1.0));
        }

        if let Some(limit) = &rule.aggregate_limit {
            // An aggregate rule cannot police an action whose value is
            // unstated: extraction failure skips the check entirely.
            if let Some(value) = numeric_at(&action.params, &limit.field) {
                let key = Self::aggregate_key(&action.project_id, &rule.identity);
                let window = Duration::seconds(limit.window_seconds as i64);
                let decision = match self
                    .store
                    .sliding_increment(&key, value, window, limit.max, now)
                {
                    Ok(decision) => decision,
                    Err(error) => {
                        self.rollback_all(&recorded, now);
                        return Err(error);
                    }
                };
                if !decision.admitted {
                    self.rollback_all(&recorded, now);
                    return Ok(QuotaOutcome::Refused {
                        reason: format!(
                            "aggregate limit exceeded ({} + {} > {} over last {} seconds)",
                            format_total(decision.current),
                            format_total(value),
                            format_total(limit.max),
                            limit.window_seconds
                        ),
                    });
                }
                recorded.push((key, value));
            }
        }

        if simulate {
            self.rollback_all(&recorded, now);
        }
        Ok(QuotaOutcome::Admitted)
    }

    /// Best-effort rollback of everything recorded so far. Failures are
    /// logged, not propagated: rollback already runs on a refusal or fault
    /// path and must not mask the original outcome.
    fn rollback_all(&self, recorded: &[(String, f64)], now: DateTime<Utc>) {
        for (key, weight) in recorded {
            if let Err(error) = self.store.rollback(key, *weight, now) {
                warn!(key = %key, error = %error, "counter rollback failed");
            }
        }
    }
}

/// Render a counter total: integers without a fraction, everything else
/// with two decimals.
fn format_total(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n:.2}")
    }
}
