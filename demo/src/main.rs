//! Palisade — Action-Validation Gateway Demo CLI
//!
//! Runs one or all of the gateway demo scenarios. Each scenario wires real
//! Palisade components (policy store, counter store, buffered audit sink,
//! decision pipeline) over in-memory backends.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- payment
//!   cargo run -p demo -- rate-limit
//!   cargo run -p demo -- aggregate
//!   cargo run -p demo -- simulate
//!   cargo run -p demo -- templates

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use palisade_audit::{BufferedAuditSink, InMemoryAuditStore};
use palisade_contracts::{Action, AuditFilter, DecideOptions, Decision, GatewayResult};
use palisade_core::{
    CounterBackend, CounterStore, Gateway, GatewayConfig, InMemoryPolicyStore, SystemClock,
};
use palisade_policy::builtin_templates;
use palisade_quota::InMemoryCounterStore;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Palisade — policy gateway for autonomous agent actions.
///
/// Each subcommand runs one or all of the demo scenarios, showing rule
/// matching, constraint evaluation, quota enforcement, simulation, and the
/// hash-chained audit trail.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Palisade action-validation gateway demo",
    long_about = "Runs Palisade demo scenarios showing policy enforcement,\n\
                  sliding-window quotas, simulation mode, and audit logging.\n\n\
                  Scenarios:\n\
                  1. Payment policy       — constraints, agent lists, default block\n\
                  2. Rate limit           — 3-per-minute request quota\n\
                  3. Aggregate limit      — daily cumulative amount cap\n\
                  4. Simulation           — side-effect-free what-if decisions\n\
                  5. Templates            — installing a built-in policy template"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all demo scenarios in sequence.
    RunAll,
    /// Scenario 1: payment policy (constraints + default block).
    Payment,
    /// Scenario 2: request rate limiting.
    RateLimit,
    /// Scenario 3: aggregate (cumulative value) limiting.
    Aggregate,
    /// Scenario 4: simulation mode.
    Simulate,
    /// Scenario 5: built-in policy templates.
    Templates,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging. Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::Payment => run_payment(),
        Command::RateLimit => run_rate_limit(),
        Command::Aggregate => run_aggregate(),
        Command::Simulate => run_simulate(),
        Command::Templates => run_templates(),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {e}");
            std::process::exit(1);
        }
    }
}

fn run_all() -> GatewayResult<()> {
    run_payment()?;
    run_rate_limit()?;
    run_aggregate()?;
    run_simulate()?;
    run_templates()?;
    Ok(())
}

// ── Wiring ────────────────────────────────────────────────────────────────────

struct Demo {
    gateway: Gateway,
    audit_store: Arc<InMemoryAuditStore>,
    audit_sink: Arc<BufferedAuditSink>,
}

impl Demo {
    fn new() -> Self {
        let config = GatewayConfig::default();
        let counter_store: Arc<dyn CounterStore> = match config.counter_backend {
            CounterBackend::Local => Arc::new(InMemoryCounterStore::new()),
            // An external backend would be injected here; the demo ships
            // only the local one.
            CounterBackend::External => Arc::new(InMemoryCounterStore::new()),
        };
        let audit_store = Arc::new(InMemoryAuditStore::new());
        let audit_sink = Arc::new(BufferedAuditSink::new(
            audit_store.clone(),
            config.audit_buffer_size,
        ));
        let gateway = Gateway::new(
            Arc::new(InMemoryPolicyStore::new()),
            counter_store,
            audit_sink.clone(),
            audit_store.clone(),
            Arc::new(SystemClock),
            config,
        );
        Self {
            gateway,
            audit_store,
            audit_sink,
        }
    }

    fn decide(&self, action: &Action) -> GatewayResult<Decision> {
        self.gateway.decide(action, &DecideOptions::default())
    }

    fn print_audit_summary(&self, project_id: &str) -> GatewayResult<()> {
        self.audit_sink.flush();
        let page = self
            .gateway
            .list_audit(&AuditFilter::for_project(project_id))?;
        println!(
            "  audit: {} entries for '{}', chain valid: {}",
            page.records.len(),
            project_id,
            self.audit_store.verify_integrity(),
        );
        Ok(())
    }
}

fn print_decision(label: &str, decision: &Decision) {
    if decision.allowed {
        println!(
            "  [{label}] ALLOWED  id={} ({:.2} ms)",
            decision.action_id.as_deref().unwrap_or("-"),
            decision.execution_time_ms,
        );
    } else {
        println!(
            "  [{label}] BLOCKED  {}",
            decision.reason.as_deref().unwrap_or("-"),
        );
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

fn run_payment() -> GatewayResult<()> {
    println!("Scenario 1: payment policy");
    let demo = Demo::new();

    demo.gateway.upsert_policy(
        "finbot-123",
        &json!({
            "name": "invoice-policy",
            "version": "1.0",
            "default": "block",
            "rules": [{
                "action_type": "pay_invoice",
                "constraints": {
                    "params.amount": { "max": 10000, "min": 0 },
                    "params.currency": { "in": ["USD", "EUR"] },
                },
                "allowed_agents": ["invoice_agent"],
            }],
        }),
    )?;

    let ok = Action::new(
        "finbot-123",
        "invoice_agent",
        "pay_invoice",
        json!({ "amount": 5000, "currency": "USD", "vendor": "VendorA" }),
    );
    print_decision("in-budget payment", &demo.decide(&ok)?);

    let too_high = Action::new(
        "finbot-123",
        "invoice_agent",
        "pay_invoice",
        json!({ "amount": 50000, "currency": "USD" }),
    );
    print_decision("oversized payment", &demo.decide(&too_high)?);

    let bad_currency = Action::new(
        "finbot-123",
        "invoice_agent",
        "pay_invoice",
        json!({ "amount": 100, "currency": "JPY" }),
    );
    print_decision("JPY payment", &demo.decide(&bad_currency)?);

    let unmatched = Action::new("finbot-123", "invoice_agent", "delete_user", json!({}));
    print_decision("unmatched action", &demo.decide(&unmatched)?);

    demo.print_audit_summary("finbot-123")?;
    println!();
    Ok(())
}

fn run_rate_limit() -> GatewayResult<()> {
    println!("Scenario 2: rate limit (3 requests / 60 s)");
    let demo = Demo::new();

    demo.gateway.upsert_policy(
        "finbot-123",
        &json!({
            "version": "1.0",
            "default": "block",
            "rules": [{
                "action_type": "pay_invoice",
                "rate_limit": { "max_requests": 3, "window_seconds": 60 },
            }],
        }),
    )?;

    for n in 1..=5 {
        let action = Action::new(
            "finbot-123",
            "invoice_agent",
            "pay_invoice",
            json!({ "amount": 100, "currency": "USD" }),
        );
        print_decision(&format!("call {n}/5"), &demo.decide(&action)?);
    }

    demo.print_audit_summary("finbot-123")?;
    println!();
    Ok(())
}

fn run_aggregate() -> GatewayResult<()> {
    println!("Scenario 3: aggregate limit (50,000 / day on amount)");
    let demo = Demo::new();

    demo.gateway.upsert_policy(
        "finbot-123",
        &json!({
            "version": "1.0",
            "default": "block",
            "rules": [{
                "action_type": "pay_invoice",
                "aggregate_limit": { "field": "amount", "max": 50000, "window_seconds": 86400 },
            }],
        }),
    )?;

    for amount in [30000, 15000, 10000] {
        let action = Action::new(
            "finbot-123",
            "invoice_agent",
            "pay_invoice",
            json!({ "amount": amount }),
        );
        print_decision(&format!("payment of {amount}"), &demo.decide(&action)?);
    }

    demo.print_audit_summary("finbot-123")?;
    println!();
    Ok(())
}

fn run_simulate() -> GatewayResult<()> {
    println!("Scenario 4: simulation (what-if, no side effects)");
    let demo = Demo::new();

    demo.gateway.upsert_policy(
        "finbot-123",
        &json!({
            "version": "1.0",
            "default": "block",
            "rules": [{
                "action_type": "pay_invoice",
                "constraints": { "params.amount": { "max": 10000 } },
            }],
        }),
    )?;

    let action = Action::new(
        "finbot-123",
        "invoice_agent",
        "pay_invoice",
        json!({ "amount": 50000 }),
    );
    let decision = demo.gateway.decide(&action, &DecideOptions::simulated())?;
    print_decision("simulated oversized payment", &decision);
    println!(
        "  simulated={}, action_id={:?}",
        decision.simulated, decision.action_id
    );

    // Simulation leaves no audit trail behind.
    demo.print_audit_summary("finbot-123")?;
    println!();
    Ok(())
}

fn run_templates() -> GatewayResult<()> {
    println!("Scenario 5: built-in policy templates");
    let demo = Demo::new();

    for template in builtin_templates() {
        println!("  template '{}' — {}", template.id, template.description);
    }

    let finance = palisade_policy::template("finance").expect("finance template exists");
    let installed = demo.gateway.upsert_policy("finbot-123", &finance.document)?;
    println!(
        "  installed '{}' version {} with {} rules",
        installed.name,
        installed.version,
        installed.rules.len()
    );

    let action = Action::new(
        "finbot-123",
        "invoice_agent",
        "pay_invoice",
        json!({ "amount": 2500, "currency": "USD" }),
    );
    print_decision("payment under template", &demo.decide(&action)?);

    demo.print_audit_summary("finbot-123")?;
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Palisade — Action-Validation Gateway");
    println!("Demo scenarios");
    println!("====================================");
    println!();
    println!("Decision pipeline per action:");
    println!("  [1] Policy fetch (cached) — unconfigured projects default to allow");
    println!("  [2] Rule match: literal action types before wildcards");
    println!("  [3] Agent lists + constraint evaluation → block reasons");
    println!("  [4] Quota gates: request limit, then aggregate limit (with rollback)");
    println!("  [5] Audit entry appended to the SHA-256 chain (skipped in simulation)");
    println!();
}
