//! In-memory reference implementation of [`PolicyStore`].
//!
//! Keeps the full policy history per project; the last entry is the active
//! policy. Replacement is atomic per project: readers see either the prior
//! active policy or the new one.

use std::sync::Arc;

use dashmap::DashMap;

use palisade_contracts::GatewayResult;
use palisade_policy::Policy;

use crate::traits::PolicyStore;

/// An in-memory policy store.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    /// Per-project policy history, oldest first; the last entry is active.
    projects: DashMap<String, Vec<Arc<Policy>>>,
}

impl InMemoryPolicyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many policies (active included) a project has accumulated.
    pub fn history_len(&self, project_id: &str) -> usize {
        self.projects
            .get(project_id)
            .map(|history| history.len())
            .unwrap_or(0)
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn get(&self, project_id: &str) -> GatewayResult<Option<Arc<Policy>>> {
        Ok(self
            .projects
            .get(project_id)
            .and_then(|history| history.last().cloned()))
    }

    fn put(&self, project_id: &str, policy: Policy) -> GatewayResult<Arc<Policy>> {
        let stored = Arc::new(policy);
        self.projects
            .entry(project_id.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }
}
