//! TTL-bounded policy cache.
//!
//! One entry per project. Reads go through dashmap's sharded map, so the
//! decide path never takes a process-wide lock; writes replace a single
//! key. Positive entries (a policy) live for `policy_cache_ttl`; negative
//! entries (project has no policy) live for `project_cache_ttl`, which
//! keeps unconfigured projects from hammering the policy store without
//! letting a freshly installed policy go unnoticed for long.
//!
//! Staleness is bounded by the TTLs; `upsert_policy` additionally
//! invalidates the updated project so in-process callers see the new policy
//! immediately. Operators wanting strict read-through set the TTL to zero.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use palisade_policy::Policy;

struct CacheSlot {
    /// `None` caches the absence of a policy.
    policy: Option<Arc<Policy>>,
    fetched_at: DateTime<Utc>,
}

/// A per-process policy cache keyed by project id.
pub struct PolicyCache {
    slots: DashMap<String, CacheSlot>,
    policy_ttl: chrono::Duration,
    negative_ttl: chrono::Duration,
}

impl PolicyCache {
    /// Create a cache with the given TTLs (see [`crate::config::GatewayConfig`]).
    pub fn new(policy_ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            policy_ttl: chrono::Duration::seconds(policy_ttl.as_secs() as i64),
            negative_ttl: chrono::Duration::seconds(negative_ttl.as_secs() as i64),
        }
    }

    /// Look up a project. The outer `Option` is the cache outcome (miss or
    /// expired ⇒ `None`); the inner one is the cached lookup result.
    pub fn get(&self, project_id: &str, now: DateTime<Utc>) -> Option<Option<Arc<Policy>>> {
        let slot = self.slots.get(project_id)?;
        let ttl = if slot.policy.is_some() {
            self.policy_ttl
        } else {
            self.negative_ttl
        };
        if now - slot.fetched_at < ttl {
            Some(slot.policy.clone())
        } else {
            None
        }
    }

    /// Store a lookup result for a project.
    pub fn put(&self, project_id: &str, policy: Option<Arc<Policy>>, now: DateTime<Utc>) {
        self.slots.insert(
            project_id.to_string(),
            CacheSlot {
                policy,
                fetched_at: now,
            },
        );
    }

    /// Drop whatever is cached for a project.
    pub fn invalidate(&self, project_id: &str) {
        self.slots.remove(project_id);
    }
}
