//! Process-wide gateway configuration.

use std::time::Duration;

/// Block reason used in fail-closed mode when the operator has not
/// configured an override.
pub const DEFAULT_FAIL_CLOSED_REASON: &str = "service unavailable (fail-closed)";

/// Which counter backend the deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterBackend {
    /// Per-process in-memory counters. Exact within the process; each
    /// process counts independently.
    #[default]
    Local,
    /// An externally injected shared store (e.g. a networked cache).
    /// Counts are shared but best-effort under store unavailability; the
    /// `fail_closed` setting decides what unavailability means.
    External,
}

/// Gateway configuration. One instance per process, passed at construction.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a fetched policy is reused before refetching. Zero disables
    /// policy caching entirely.
    pub policy_cache_ttl: Duration,
    /// How long a "project has no policy" lookup result is reused.
    pub project_cache_ttl: Duration,
    /// When set, infrastructure faults on the decide path yield a blocked
    /// decision instead of surfacing as errors.
    pub fail_closed: bool,
    /// Overrides [`DEFAULT_FAIL_CLOSED_REASON`] on fail-closed blocks.
    pub fail_closed_reason: Option<String>,
    /// Bound on queued audit entries in the buffered sink; beyond this the
    /// oldest queued entry is dropped and a counter incremented.
    pub audit_buffer_size: usize,
    /// Which counter backend this deployment selects. The core consumes
    /// whatever `CounterStore` it is constructed with; this setting
    /// documents the choice for composition code and operators.
    pub counter_backend: CounterBackend,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            policy_cache_ttl: Duration::from_secs(300),
            project_cache_ttl: Duration::from_secs(60),
            fail_closed: false,
            fail_closed_reason: None,
            audit_buffer_size: 1024,
            counter_backend: CounterBackend::Local,
        }
    }
}

impl GatewayConfig {
    /// The reason string used on fail-closed blocks.
    pub fn fail_closed_reason(&self) -> &str {
        self.fail_closed_reason
            .as_deref()
            .unwrap_or(DEFAULT_FAIL_CLOSED_REASON)
    }
}
