//! The gateway decision pipeline.
//!
//! `Gateway::decide` drives the full path for one action:
//!
//!   validate → policy fetch (cached) → match + constraints → default
//!   → quota gates → decision → [if !simulate] audit → return
//!
//! A blocked action is an ordinary `Decision`, never an error. The only
//! errors that escape are caller mistakes (`InvalidAction`) and — when
//! fail-closed mode is off — infrastructure faults. With fail-closed on,
//! infrastructure faults on the decide path become blocked decisions with a
//! configurable reason, and are still audited best-effort.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use palisade_contracts::{
    generate_action_id, Action, AuditEntry, AuditFilter, AuditPage, DecideOptions, Decision,
    GatewayError, GatewayResult,
};
use palisade_policy::{match_action, Effect, Policy, Verdict};

use crate::cache::PolicyCache;
use crate::config::GatewayConfig;
use crate::metrics::{GatewayMetrics, MetricsSnapshot};
use crate::quota::{QuotaEngine, QuotaOutcome};
use crate::traits::{AppendOutcome, AuditQuery, AuditSink, Clock, CounterStore, PolicyStore};

/// The action-validation gateway: policy CRUD plus the `decide` operation.
///
/// One instance per process. All methods take `&self`; the gateway is
/// `Send + Sync` and meant to be shared behind an `Arc` across request
/// handler threads.
pub struct Gateway {
    policy_store: Arc<dyn PolicyStore>,
    quota: QuotaEngine,
    audit_sink: Arc<dyn AuditSink>,
    audit_query: Arc<dyn AuditQuery>,
    clock: Arc<dyn Clock>,
    cache: PolicyCache,
    metrics: GatewayMetrics,
    config: GatewayConfig,
}

impl Gateway {
    /// Wire a gateway from its collaborators.
    pub fn new(
        policy_store: Arc<dyn PolicyStore>,
        counter_store: Arc<dyn CounterStore>,
        audit_sink: Arc<dyn AuditSink>,
        audit_query: Arc<dyn AuditQuery>,
        clock: Arc<dyn Clock>,
        config: GatewayConfig,
    ) -> Self {
        let cache = PolicyCache::new(config.policy_cache_ttl, config.project_cache_ttl);
        Self {
            policy_store,
            quota: QuotaEngine::new(counter_store),
            audit_sink,
            audit_query,
            clock,
            cache,
            metrics: GatewayMetrics::default(),
            config,
        }
    }

    /// Decide whether `action` may proceed.
    ///
    /// # Outcomes
    ///
    /// - `Ok(decision)` — allowed or blocked; blocked decisions always carry
    ///   a reason.
    /// - `Err(InvalidAction)` — the action failed structural validation.
    /// - `Err(InfraFault | DeadlineExceeded | Internal)` — only when
    ///   fail-closed mode is off; with it on, these become blocked
    ///   decisions instead.
    pub fn decide(&self, action: &Action, options: &DecideOptions) -> GatewayResult<Decision> {
        let started = Instant::now();
        action.validate()?;

        match self.decide_inner(action, options, started) {
            Ok(decision) => Ok(decision),
            Err(fault) if fault.is_infrastructure() && self.config.fail_closed => {
                if matches!(fault, GatewayError::Internal { .. }) {
                    error!(error = %fault, "invariant violation on decide path, failing closed");
                } else {
                    warn!(error = %fault, "infrastructure fault on decide path, failing closed");
                }
                self.metrics.record_fail_closed();
                let reason = self.config.fail_closed_reason().to_string();
                Ok(self.finish(action, options, started, None, Err(reason)))
            }
            Err(fault) => {
                if matches!(fault, GatewayError::Internal { .. }) {
                    error!(error = %fault, "invariant violation on decide path");
                }
                Err(fault)
            }
        }
    }

    fn decide_inner(
        &self,
        action: &Action,
        options: &DecideOptions,
        started: Instant,
    ) -> GatewayResult<Decision> {
        self.check_deadline(options, "policy lookup")?;
        let policy = self.active_policy_cached(&action.project_id)?;
        let policy_version = policy.as_ref().map(|p| p.version.clone());

        let outcome: Result<(), String> = match &policy {
            // Unconfigured projects do not block.
            None => Ok(()),
            Some(policy) => {
                match match_action(policy, &action.agent_name, &action.action_type, &action.params)
                {
                    Verdict::Block { reason } => Err(reason),
                    Verdict::Default(Effect::Allow) => Ok(()),
                    Verdict::Default(Effect::Block) => {
                        Err("no matching rule; policy default is block".to_string())
                    }
                    Verdict::AllowPending(rule) => {
                        if rule.rate_limit.is_some() || rule.aggregate_limit.is_some() {
                            self.check_deadline(options, "quota check")?;
                            let now = self.clock.now();
                            match self.quota.check(action, rule, now, options.simulate)? {
                                QuotaOutcome::Admitted => Ok(()),
                                QuotaOutcome::Refused { reason } => Err(reason),
                            }
                        } else {
                            Ok(())
                        }
                    }
                }
            }
        };

        Ok(self.finish(action, options, started, policy_version, outcome))
    }

    /// Build the decision, count it, and — for non-simulated calls — emit
    /// the audit entry. Audit failures are logged and counted; they never
    /// change the decision.
    fn finish(
        &self,
        action: &Action,
        options: &DecideOptions,
        started: Instant,
        policy_version: Option<String>,
        outcome: Result<(), String>,
    ) -> Decision {
        let execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let timestamp = self.clock.now();
        let action_id = if options.simulate {
            None
        } else {
            Some(generate_action_id())
        };

        let decision = match outcome {
            Ok(()) => Decision::allowed(
                action_id,
                timestamp,
                policy_version,
                execution_time_ms,
                options.simulate,
            ),
            Err(reason) => Decision::blocked(
                reason,
                action_id,
                timestamp,
                policy_version,
                execution_time_ms,
                options.simulate,
            ),
        };

        debug!(
            project = %action.project_id,
            agent = %action.agent_name,
            action_type = %action.action_type,
            allowed = decision.allowed,
            simulated = decision.simulated,
            "decision produced"
        );
        self.metrics.record_decision(decision.allowed, decision.simulated);

        if !options.simulate {
            let entry = AuditEntry::record(action, &decision);
            match self.audit_sink.append(&entry) {
                Ok(AppendOutcome::Accepted) => {}
                Ok(AppendOutcome::Dropped) => {
                    warn!(action_id = %entry.action_id, "audit entry dropped by sink");
                    self.metrics.record_audit_dropped();
                }
                Err(fault) => {
                    warn!(
                        action_id = %entry.action_id,
                        error = %fault,
                        "audit append failed, entry dropped"
                    );
                    self.metrics.record_audit_dropped();
                }
            }
        }

        decision
    }

    fn active_policy_cached(&self, project_id: &str) -> GatewayResult<Option<Arc<Policy>>> {
        let now = self.clock.now();
        if let Some(cached) = self.cache.get(project_id, now) {
            debug!(project = %project_id, "policy cache hit");
            return Ok(cached);
        }
        let fetched = self.policy_store.get(project_id)?;
        self.cache.put(project_id, fetched.clone(), now);
        Ok(fetched)
    }

    fn check_deadline(&self, options: &DecideOptions, stage: &str) -> GatewayResult<()> {
        if let Some(deadline) = options.deadline {
            if self.clock.now() >= deadline {
                return Err(GatewayError::DeadlineExceeded {
                    reason: format!("deadline elapsed before {stage}"),
                });
            }
        }
        Ok(())
    }

    /// Validate and install a policy document as the active policy for a
    /// project, archiving the prior one and invalidating this process's
    /// cache entry.
    pub fn upsert_policy(&self, project_id: &str, raw: &Value) -> GatewayResult<Arc<Policy>> {
        if project_id.trim().is_empty() {
            return Err(GatewayError::InvalidAction {
                reason: "project_id must be a non-empty string".to_string(),
            });
        }
        let policy = Policy::load(raw)?;
        let stored = self.policy_store.put(project_id, policy)?;
        self.cache.invalidate(project_id);
        info!(project = %project_id, version = %stored.version, "policy installed");
        Ok(stored)
    }

    /// The active policy for a project, straight from the store (no cache).
    pub fn get_active_policy(&self, project_id: &str) -> GatewayResult<Option<Arc<Policy>>> {
        self.policy_store.get(project_id)
    }

    /// Page through audit entries, newest first.
    pub fn list_audit(&self, filter: &AuditFilter) -> GatewayResult<AuditPage> {
        self.audit_query.list(filter)
    }

    /// Current process-wide counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;

    use palisade_contracts::{AuditRecord, GatewayError};

    use crate::clock::ManualClock;
    use crate::policy_store::InMemoryPolicyStore;
    use crate::traits::WindowDecision;

    use super::*;

    // ── Mock collaborators ────────────────────────────────────────────────────

    /// Counter store with real sliding-window semantics over a plain map.
    #[derive(Default)]
    struct MockCounterStore {
        windows: Mutex<HashMap<String, Vec<(DateTime<Utc>, f64)>>>,
    }

    impl MockCounterStore {
        fn total(&self, key: &str) -> f64 {
            self.windows
                .lock()
                .unwrap()
                .get(key)
                .map(|entries| entries.iter().map(|(_, w)| w).sum())
                .unwrap_or(0.0)
        }
    }

    impl CounterStore for MockCounterStore {
        fn sliding_increment(
            &self,
            key: &str,
            weight: f64,
            window: Duration,
            max: f64,
            now: DateTime<Utc>,
        ) -> GatewayResult<WindowDecision> {
            let mut windows = self.windows.lock().unwrap();
            let entries = windows.entry(key.to_string()).or_default();
            entries.retain(|(at, _)| *at > now - window);
            let current: f64 = entries.iter().map(|(_, w)| w).sum();
            if current + weight > max {
                return Ok(WindowDecision {
                    admitted: false,
                    current,
                });
            }
            entries.push((now, weight));
            Ok(WindowDecision {
                admitted: true,
                current,
            })
        }

        fn rollback(&self, key: &str, weight: f64, now: DateTime<Utc>) -> GatewayResult<()> {
            let mut windows = self.windows.lock().unwrap();
            if let Some(entries) = windows.get_mut(key) {
                if let Some(position) = entries
                    .iter()
                    .rposition(|(at, w)| *at == now && *w == weight)
                {
                    entries.remove(position);
                }
            }
            Ok(())
        }
    }

    /// Synchronous audit store: a Vec behind a mutex, with filtering and
    /// descending cursor pagination.
    #[derive(Default)]
    struct MockAuditStore {
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl MockAuditStore {
        fn all(&self) -> Vec<AuditEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    impl AuditSink for MockAuditStore {
        fn append(&self, entry: &AuditEntry) -> GatewayResult<AppendOutcome> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(AppendOutcome::Accepted)
        }
    }

    impl AuditQuery for MockAuditStore {
        fn list(&self, filter: &AuditFilter) -> GatewayResult<AuditPage> {
            let entries = self.entries.lock().unwrap();
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
            let upper = filter.cursor.unwrap_or(entries.len() as u64);
            let mut records: Vec<AuditRecord> = entries
                .iter()
                .enumerate()
                .filter(|(sequence, entry)| (*sequence as u64) < upper && matches(entry))
                .map(|(sequence, entry)| AuditRecord {
                    sequence: sequence as u64,
                    entry: entry.clone(),
                })
                .collect();
            records.reverse();
            let has_more = records.len() > filter.effective_limit();
            records.truncate(filter.effective_limit());
            let next_cursor = if has_more {
                records.last().map(|r| r.sequence)
            } else {
                None
            };
            Ok(AuditPage {
                records,
                next_cursor,
            })
        }
    }

    /// A policy store whose reads always fault.
    struct FailingPolicyStore;

    impl PolicyStore for FailingPolicyStore {
        fn get(&self, _project_id: &str) -> GatewayResult<Option<Arc<Policy>>> {
            Err(GatewayError::InfraFault {
                reason: "policy store unreachable".to_string(),
            })
        }

        fn put(&self, _project_id: &str, _policy: Policy) -> GatewayResult<Arc<Policy>> {
            Err(GatewayError::InfraFault {
                reason: "policy store unreachable".to_string(),
            })
        }
    }

    /// An audit sink whose writes always fault.
    struct FailingAuditSink;

    impl AuditSink for FailingAuditSink {
        fn append(&self, _entry: &AuditEntry) -> GatewayResult<AppendOutcome> {
            Err(GatewayError::InfraFault {
                reason: "audit sink unreachable".to_string(),
            })
        }
    }

    // ── Harness ───────────────────────────────────────────────────────────────

    struct Harness {
        gateway: Gateway,
        counters: Arc<MockCounterStore>,
        audit: Arc<MockAuditStore>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(config: GatewayConfig) -> Harness {
        let counters = Arc::new(MockCounterStore::default());
        let audit = Arc::new(MockAuditStore::default());
        let clock = Arc::new(ManualClock::from_wall_clock());
        let gateway = Gateway::new(
            Arc::new(InMemoryPolicyStore::new()),
            counters.clone(),
            audit.clone(),
            audit.clone(),
            clock.clone(),
            config,
        );
        Harness {
            gateway,
            counters,
            audit,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(GatewayConfig::default())
    }

    /// A default-block payment policy shared across the tests.
    fn payment_policy() -> serde_json::Value {
        json!({
            "name": "invoice-policy",
            "version": "1.0",
            "default": "block",
            "rules": [{
                "action_type": "pay_invoice",
                "constraints": {
                    "params.amount": { "max": 10000, "min": 0 },
                    "params.currency": { "in": ["USD", "EUR"] },
                },
            }],
        })
    }

    fn payment(amount: i64, currency: &str) -> Action {
        Action::new(
            "proj-1",
            "invoice_agent",
            "pay_invoice",
            json!({ "amount": amount, "currency": currency }),
        )
    }

    // ── End-to-end scenarios ──────────────────────────────────────────────────

    /// A payment inside every constraint is allowed, with an action id
    /// and no reason.
    #[test]
    fn in_budget_payment_is_allowed() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let decision = h
            .gateway
            .decide(&payment(5000, "USD"), &DecideOptions::default())
            .unwrap();

        assert!(decision.allowed);
        assert!(decision.reason.is_none());
        assert!(decision.action_id.as_deref().unwrap().starts_with("act_"));
        assert_eq!(decision.policy_version.as_deref(), Some("1.0"));
        assert!(!decision.simulated);
    }

    /// An amount above the maximum blocks, citing the path and bound.
    #[test]
    fn oversized_amount_blocks_with_bound() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let decision = h
            .gateway
            .decide(&payment(50000, "USD"), &DecideOptions::default())
            .unwrap();

        assert!(!decision.allowed);
        let reason = decision.reason.unwrap();
        assert!(reason.contains("params.amount"), "{reason}");
        assert!(reason.contains("10000"), "{reason}");
    }

    /// A disallowed currency blocks, citing the path.
    #[test]
    fn disallowed_currency_blocks() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let decision = h
            .gateway
            .decide(&payment(100, "JPY"), &DecideOptions::default())
            .unwrap();

        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("params.currency"));
    }

    /// An unmatched action under default-block is refused with the
    /// default-block reason.
    #[test]
    fn default_block_when_no_rule_matches() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let action = Action::new("proj-1", "invoice_agent", "delete_user", json!({}));
        let decision = h.gateway.decide(&action, &DecideOptions::default()).unwrap();

        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("no matching rule; policy default is block")
        );
    }

    /// Three of five rapid calls pass a 3-per-60s limit; after the
    /// window slides past, the next call passes again.
    #[test]
    fn rate_limit_window_slides() {
        let h = harness();
        let mut policy = payment_policy();
        policy["rules"][0]["rate_limit"] = json!({ "max_requests": 3, "window_seconds": 60 });
        h.gateway.upsert_policy("proj-1", &policy).unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            let decision = h
                .gateway
                .decide(&payment(100, "USD"), &DecideOptions::default())
                .unwrap();
            outcomes.push(decision);
            h.clock.advance(Duration::seconds(2));
        }
        assert!(outcomes[0].allowed && outcomes[1].allowed && outcomes[2].allowed);
        for blocked in &outcomes[3..] {
            assert!(!blocked.allowed);
            assert!(
                blocked.reason.as_deref().unwrap().contains("rate limit exceeded"),
                "{:?}",
                blocked.reason
            );
        }

        // All three admitted events slide out of the window.
        h.clock.advance(Duration::seconds(60));
        let decision = h
            .gateway
            .decide(&payment(100, "USD"), &DecideOptions::default())
            .unwrap();
        assert!(decision.allowed);
    }

    /// Simulation produces the same verdict with no action id, the
    /// simulated flag, and no audit entry.
    #[test]
    fn simulation_is_side_effect_free() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let decision = h
            .gateway
            .decide(&payment(50000, "USD"), &DecideOptions::simulated())
            .unwrap();

        assert!(!decision.allowed);
        assert!(decision.simulated);
        assert!(decision.action_id.is_none());

        let page = h
            .gateway
            .list_audit(&AuditFilter::for_project("proj-1"))
            .unwrap();
        assert!(page.records.is_empty(), "simulation must not be audited");
    }

    // ── Audit properties ──────────────────────────────────────────────────────

    /// Every non-simulated call emits exactly one entry whose action id
    /// matches the decision's.
    #[test]
    fn audit_exactly_once_with_matching_ids() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let mut ids = Vec::new();
        for amount in [100, 50000, 200] {
            let decision = h
                .gateway
                .decide(&payment(amount, "USD"), &DecideOptions::default())
                .unwrap();
            ids.push(decision.action_id.unwrap());
        }

        let entries = h.audit.all();
        assert_eq!(entries.len(), 3);
        let stored: Vec<&str> = entries.iter().map(|e| e.action_id.as_str()).collect();
        for id in &ids {
            assert!(stored.contains(&id.as_str()));
        }
        // Blocked entries are audited too, with their reason.
        assert!(entries.iter().any(|e| !e.allowed && e.reason.is_some()));
    }

    #[test]
    fn audit_failure_does_not_change_the_decision() {
        let counters = Arc::new(MockCounterStore::default());
        let audit_query = Arc::new(MockAuditStore::default());
        let policy_store = Arc::new(InMemoryPolicyStore::new());
        let gateway = Gateway::new(
            policy_store,
            counters,
            Arc::new(FailingAuditSink),
            audit_query,
            Arc::new(ManualClock::from_wall_clock()),
            GatewayConfig::default(),
        );
        gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let decision = gateway
            .decide(&payment(5000, "USD"), &DecideOptions::default())
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(gateway.metrics().audit_dropped, 1);
    }

    // ── Quota non-consumption ─────────────────────────────────────────────────

    /// Actions blocked by constraints or by the aggregate gate leave
    /// counter state untouched.
    #[test]
    fn blocked_actions_consume_no_quota() {
        let h = harness();
        let mut policy = payment_policy();
        policy["rules"][0]["rate_limit"] = json!({ "max_requests": 2, "window_seconds": 60 });
        policy["rules"][0]["aggregate_limit"] =
            json!({ "field": "amount", "max": 100, "window_seconds": 60 });
        h.gateway.upsert_policy("proj-1", &policy).unwrap();

        // Constraint-blocked: the matcher refuses before any quota touch.
        h.gateway
            .decide(&payment(50000, "USD"), &DecideOptions::default())
            .unwrap();
        let request_key = "rate:proj-1:invoice_agent:pay_invoice";
        assert_eq!(h.counters.total(request_key), 0.0);

        // Aggregate-blocked: the request increment is rolled back.
        let first = h
            .gateway
            .decide(&payment(80, "USD"), &DecideOptions::default())
            .unwrap();
        assert!(first.allowed);
        let second = h
            .gateway
            .decide(&payment(50, "USD"), &DecideOptions::default())
            .unwrap();
        assert!(!second.allowed);
        assert!(second
            .reason
            .as_deref()
            .unwrap()
            .contains("aggregate limit exceeded"));
        assert_eq!(h.counters.total(request_key), 1.0);

        // The returned request slot is usable by a small third payment.
        let third = h
            .gateway
            .decide(&payment(10, "USD"), &DecideOptions::default())
            .unwrap();
        assert!(third.allowed);
    }

    // ── Policy lookup and caching ─────────────────────────────────────────────

    #[test]
    fn unconfigured_project_allows_and_audits() {
        let h = harness();
        let action = Action::new("no-policy", "agent", "anything", json!({}));
        let decision = h.gateway.decide(&action, &DecideOptions::default()).unwrap();

        assert!(decision.allowed);
        assert!(decision.policy_version.is_none());
        assert_eq!(h.audit.all().len(), 1);
    }

    #[test]
    fn upsert_invalidates_this_process_cache() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();
        let first = h
            .gateway
            .decide(&payment(100, "USD"), &DecideOptions::default())
            .unwrap();
        assert_eq!(first.policy_version.as_deref(), Some("1.0"));

        let mut updated = payment_policy();
        updated["version"] = json!("2.0");
        h.gateway.upsert_policy("proj-1", &updated).unwrap();

        let second = h
            .gateway
            .decide(&payment(100, "USD"), &DecideOptions::default())
            .unwrap();
        assert_eq!(second.policy_version.as_deref(), Some("2.0"));
    }

    /// With concurrent decides racing one policy update, every recorded
    /// policy version is one of exactly two values.
    #[test]
    fn policy_update_is_atomic_under_concurrency() {
        let h = harness();
        let mut v1 = payment_policy();
        v1["version"] = json!("v1");
        h.gateway.upsert_policy("proj-1", &v1).unwrap();

        let gateway = &h.gateway;
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(move || {
                    for _ in 0..100 {
                        let decision = gateway
                            .decide(&payment(100, "USD"), &DecideOptions::default())
                            .unwrap();
                        let version = decision.policy_version.unwrap();
                        assert!(
                            version == "v1" || version == "v2",
                            "unexpected version {version}"
                        );
                    }
                });
            }
            let mut v2 = payment_policy();
            v2["version"] = json!("v2");
            gateway.upsert_policy("proj-1", &v2).unwrap();
        });

        // The store itself holds v2; cached visibility is bounded by TTL.
        let active = gateway.get_active_policy("proj-1").unwrap().unwrap();
        assert_eq!(active.version, "v2");
    }

    // ── Determinism ───────────────────────────────────────────────────────────

    /// Without quotas, deciding the same action under the same policy
    /// yields identical verdicts and reasons.
    #[test]
    fn pure_evaluation_is_deterministic() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let first = h
            .gateway
            .decide(&payment(50000, "USD"), &DecideOptions::default())
            .unwrap();
        for _ in 0..5 {
            let next = h
                .gateway
                .decide(&payment(50000, "USD"), &DecideOptions::default())
                .unwrap();
            assert_eq!(next.allowed, first.allowed);
            assert_eq!(next.reason, first.reason);
            assert_eq!(next.policy_version, first.policy_version);
        }
    }

    // ── Fail-closed and fault surfacing ───────────────────────────────────────

    #[test]
    fn store_fault_surfaces_when_fail_open() {
        let gateway = Gateway::new(
            Arc::new(FailingPolicyStore),
            Arc::new(MockCounterStore::default()),
            Arc::new(MockAuditStore::default()),
            Arc::new(MockAuditStore::default()),
            Arc::new(ManualClock::from_wall_clock()),
            GatewayConfig::default(),
        );
        let result = gateway.decide(&payment(100, "USD"), &DecideOptions::default());
        assert!(matches!(result, Err(GatewayError::InfraFault { .. })));
    }

    #[test]
    fn store_fault_blocks_when_fail_closed() {
        let audit = Arc::new(MockAuditStore::default());
        let gateway = Gateway::new(
            Arc::new(FailingPolicyStore),
            Arc::new(MockCounterStore::default()),
            audit.clone(),
            audit.clone(),
            Arc::new(ManualClock::from_wall_clock()),
            GatewayConfig {
                fail_closed: true,
                ..GatewayConfig::default()
            },
        );

        let decision = gateway
            .decide(&payment(100, "USD"), &DecideOptions::default())
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("service unavailable (fail-closed)")
        );
        assert_eq!(gateway.metrics().fail_closed, 1);
        // Fail-closed blocks are still audited.
        assert_eq!(audit.all().len(), 1);
    }

    #[test]
    fn fail_closed_reason_can_be_overridden() {
        let gateway = Gateway::new(
            Arc::new(FailingPolicyStore),
            Arc::new(MockCounterStore::default()),
            Arc::new(MockAuditStore::default()),
            Arc::new(MockAuditStore::default()),
            Arc::new(ManualClock::from_wall_clock()),
            GatewayConfig {
                fail_closed: true,
                fail_closed_reason: Some("gateway offline, action refused".to_string()),
                ..GatewayConfig::default()
            },
        );
        let decision = gateway
            .decide(&payment(100, "USD"), &DecideOptions::default())
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("gateway offline, action refused")
        );
    }

    #[test]
    fn elapsed_deadline_is_an_infrastructure_fault() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        let options = DecideOptions {
            simulate: false,
            deadline: Some(h.clock.now() - Duration::seconds(1)),
        };
        let result = h.gateway.decide(&payment(100, "USD"), &options);
        assert!(matches!(result, Err(GatewayError::DeadlineExceeded { .. })));

        // Under fail-closed, the same situation blocks instead.
        let hc = harness_with(GatewayConfig {
            fail_closed: true,
            ..GatewayConfig::default()
        });
        hc.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();
        let options = DecideOptions {
            simulate: false,
            deadline: Some(hc.clock.now() - Duration::seconds(1)),
        };
        let decision = hc.gateway.decide(&payment(100, "USD"), &options).unwrap();
        assert!(!decision.allowed);
    }

    #[test]
    fn invalid_action_surfaces_even_under_fail_closed() {
        let h = harness_with(GatewayConfig {
            fail_closed: true,
            ..GatewayConfig::default()
        });
        let action = Action::new("proj-1", "", "pay_invoice", json!({}));
        let result = h.gateway.decide(&action, &DecideOptions::default());
        assert!(matches!(result, Err(GatewayError::InvalidAction { .. })));
    }

    // ── Administrative surface ────────────────────────────────────────────────

    #[test]
    fn upsert_rejects_malformed_documents() {
        let h = harness();
        let result = h.gateway.upsert_policy(
            "proj-1",
            &json!({ "rules": [{ "constraints": { "x": { "sum": 1 } } }] }),
        );
        assert!(matches!(result, Err(GatewayError::PolicyMalformed { .. })));
        // Nothing was installed.
        assert!(h.gateway.get_active_policy("proj-1").unwrap().is_none());
    }

    #[test]
    fn list_audit_pages_descending() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();
        for _ in 0..5 {
            h.gateway
                .decide(&payment(100, "USD"), &DecideOptions::default())
                .unwrap();
        }

        let mut filter = AuditFilter::for_project("proj-1");
        filter.limit = 2;
        let first = h.gateway.list_audit(&filter).unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[0].sequence, 4);
        assert_eq!(first.records[1].sequence, 3);

        filter.cursor = first.next_cursor;
        let second = h.gateway.list_audit(&filter).unwrap();
        assert_eq!(second.records[0].sequence, 2);
    }

    #[test]
    fn metrics_reflect_outcomes() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();

        h.gateway
            .decide(&payment(100, "USD"), &DecideOptions::default())
            .unwrap();
        h.gateway
            .decide(&payment(50000, "USD"), &DecideOptions::default())
            .unwrap();
        h.gateway
            .decide(&payment(50000, "USD"), &DecideOptions::simulated())
            .unwrap();

        let snapshot = h.gateway.metrics();
        assert_eq!(snapshot.decisions, 3);
        assert_eq!(snapshot.allowed, 1);
        assert_eq!(snapshot.blocked, 2);
        assert_eq!(snapshot.simulated, 1);
    }

    // Deadline far in the future does not interfere.
    #[test]
    fn future_deadline_is_inert() {
        let h = harness();
        h.gateway.upsert_policy("proj-1", &payment_policy()).unwrap();
        let options = DecideOptions {
            simulate: false,
            deadline: Some(h.clock.now() + Duration::seconds(30)),
        };
        assert!(h.gateway.decide(&payment(100, "USD"), &options).unwrap().allowed);
    }
}
