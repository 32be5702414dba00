//! Built-in policy template catalog.
//!
//! Ready-made policy documents operators can install as a starting point,
//! addressable by a short id. Every template is a plain JSON document that
//! loads through [`Policy::load`](crate::model::Policy::load) — the catalog
//! has no special powers.

use serde_json::{json, Value};

/// A named, ready-made policy document.
#[derive(Debug, Clone)]
pub struct PolicyTemplate {
    /// Short identifier (e.g. `"finance"`).
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One-line description of what the template enforces.
    pub description: &'static str,
    /// The raw policy document.
    pub document: Value,
}

/// All built-in templates.
pub fn builtin_templates() -> Vec<PolicyTemplate> {
    vec![
        PolicyTemplate {
            id: "finance",
            name: "Finance guardrails",
            description: "Caps payment amounts, restricts currencies, and rate-limits invoice payments",
            document: json!({
                "name": "finance-guardrails",
                "version": "1.0",
                "default": "block",
                "rules": [
                    {
                        "action_type": "pay_invoice",
                        "constraints": {
                            "params.amount": { "min": 0, "max": 10000 },
                            "params.currency": { "in": ["USD", "EUR"] },
                        },
                        "rate_limit": { "max_requests": 100, "window_seconds": 3600 },
                        "aggregate_limit": { "field": "amount", "max": 50000, "window_seconds": 86400 },
                    },
                    {
                        "action_type": "refund",
                        "constraints": {
                            "params.amount": { "min": 0, "max": 1000 },
                        },
                    },
                ],
            }),
        },
        PolicyTemplate {
            id: "customer-support",
            name: "Customer support",
            description: "Lets support agents send screened emails but blocks account mutations",
            document: json!({
                "name": "customer-support",
                "version": "1.0",
                "default": "block",
                "rules": [
                    {
                        "action_type": "send_email",
                        "constraints": {
                            "params.to": { "pattern": "@" },
                            "params.body": {
                                "not_pattern": "\\b\\d{3}-\\d{2}-\\d{4}\\b",
                                "reason": "outbound email must not contain SSN-like content",
                            },
                        },
                        "rate_limit": { "max_requests": 50, "window_seconds": 3600 },
                    },
                    { "action_type": "lookup_order" },
                    { "action_type": "delete_account", "effect": "block" },
                ],
            }),
        },
        PolicyTemplate {
            id: "read-only",
            name: "Read-only",
            description: "Allows read-prefixed actions, blocks everything else",
            document: json!({
                "name": "read-only",
                "version": "1.0",
                "default": "block",
                "rules": [
                    { "action_type": "read_record" },
                    { "action_type": "list_records" },
                    { "action_type": "search" },
                ],
            }),
        },
    ]
}

/// Look up one template by id.
pub fn template(id: &str) -> Option<PolicyTemplate> {
    builtin_templates().into_iter().find(|t| t.id == id)
}
