//! Typed policy model and document loading.
//!
//! A policy arrives as an opaque JSON document and is validated into the
//! typed shape here exactly once, at load time. Everything evaluation needs
//! — compiled regexes, parsed bounds, synthesized rule identities — is
//! materialized up front so the decide path never re-parses.
//!
//! Loading is strict about the parts that change meaning (unknown constraint
//! tags, malformed limits, bad regexes) and tolerant about unknown
//! *top-level* and rule-level fields, which are skipped for forward
//! compatibility.

use regex::Regex;
use serde_json::Value;

use palisade_contracts::{GatewayError, GatewayResult};

/// The two verdict directions a policy or rule can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Permit the action.
    Allow,
    /// Refuse the action.
    Block,
}

impl Effect {
    fn parse(s: &str, context: &str) -> GatewayResult<Self> {
        match s {
            "allow" => Ok(Self::Allow),
            "block" => Ok(Self::Block),
            other => Err(malformed(format!(
                "{context} must be \"allow\" or \"block\", got \"{other}\""
            ))),
        }
    }
}

/// A validated policy document: an ordered rule list plus a default effect
/// applied when no rule produces a verdict.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Human-readable policy name.
    pub name: String,
    /// Opaque version identifier, recorded on every decision made under
    /// this policy.
    pub version: String,
    /// Effect applied when no rule matches.
    pub default: Effect,
    /// Rules in declaration order.
    pub rules: Vec<Rule>,
}

/// One rule of a policy: a scope (action type and agent lists) combined
/// with parameter constraints and optional quotas.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Literal action type, or `"*"` to match any action.
    pub action_type: String,
    /// What a clean match of this rule produces.
    pub effect: Effect,
    /// Constraint entries as `(key as written, constraint)`, in a
    /// deterministic order.
    pub constraints: Vec<(String, Constraint)>,
    /// Whitelist gate: when present, the rule is skipped for agents not
    /// listed (later rules may still apply).
    pub allowed_agents: Option<Vec<String>>,
    /// Blacklist bar: when present, a listed agent (or the `"*"` wildcard,
    /// meaning every agent) is blocked immediately.
    pub blocked_agents: Option<Vec<String>>,
    /// Per-(project, agent, action) request quota.
    pub rate_limit: Option<RateLimit>,
    /// Per-(project, rule) cumulative value quota.
    pub aggregate_limit: Option<AggregateLimit>,
    /// Stable identity synthesized at load (declaration index + action
    /// type); keys this rule's aggregate counter.
    pub identity: String,
}

/// A rolling request quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum admitted requests inside the window.
    pub max_requests: u64,
    /// Window length in seconds.
    pub window_seconds: u64,
}

/// A rolling cumulative-value quota over a numeric parameter field.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateLimit {
    /// Dotted path of the summed parameter (e.g. `"amount"`).
    pub field: String,
    /// Maximum sum admitted inside the window.
    pub max: f64,
    /// Window length in seconds.
    pub window_seconds: u64,
}

/// A constraint entry: one or more predicates on a single parameter path.
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Predicates in canonical evaluation order; the first failing
    /// predicate produces the block reason.
    pub predicates: Vec<Predicate>,
}

/// A single predicate on a resolved parameter value.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Value must be a finite number ≥ the bound.
    Min(f64),
    /// Value must be a finite number ≤ the bound.
    Max(f64),
    /// Value must deep-equal one of the listed values.
    In(Vec<Value>),
    /// Value must deep-equal none of the listed values; an absent value is
    /// vacuously accepted.
    NotIn(Vec<Value>),
    /// Value must deep-equal the operand.
    Equals(Value),
    /// Value must be a string the regex finds a match in (partial match;
    /// anchors must be explicit).
    Pattern(Regex),
    /// The regex must find no match in the value rendered as a string
    /// (screening predicate, e.g. PII detection). Absent values are
    /// vacuously accepted.
    NotPattern {
        regex: Regex,
        /// Optional operator-supplied reason used instead of the generic one.
        reason: Option<String>,
    },
    /// The value rendered as a string must contain the substring.
    Contains(String),
    /// The value rendered as a string must not contain the substring;
    /// absent values are vacuously accepted.
    NotContains(String),
}

fn malformed(reason: impl Into<String>) -> GatewayError {
    GatewayError::PolicyMalformed {
        reason: reason.into(),
    }
}

impl Policy {
    /// Validate a raw JSON document into a typed policy.
    ///
    /// Fails with `PolicyMalformed` on: a non-object document; a `default`
    /// outside {allow, block}; `rules` that is not an array; a non-string
    /// `action_type`; unknown constraint tags; uncompilable patterns;
    /// non-positive or negative limits. Unknown top-level fields are
    /// tolerated.
    pub fn load(raw: &Value) -> GatewayResult<Self> {
        let doc = raw
            .as_object()
            .ok_or_else(|| malformed("policy document must be a JSON object"))?;

        let name = optional_string(doc.get("name"), "policy 'name'")?
            .unwrap_or_else(|| "default".to_string());
        let version = optional_string(doc.get("version"), "policy 'version'")?
            .unwrap_or_else(|| "1.0".to_string());

        let default = match doc.get("default") {
            None => Effect::Allow,
            Some(Value::String(s)) => Effect::parse(s, "policy 'default'")?,
            Some(_) => return Err(malformed("policy 'default' must be a string")),
        };

        let rules = match doc.get("rules") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| Rule::load(index, item))
                .collect::<GatewayResult<Vec<_>>>()?,
            Some(_) => return Err(malformed("policy 'rules' must be an array")),
        };

        Ok(Self {
            name,
            version,
            default,
            rules,
        })
    }

    /// Rules applicable to an action type: literal matches first, then
    /// wildcard matches, each group in declaration order.
    pub fn candidates(&self, action_type: &str) -> Vec<&Rule> {
        let literal = self.rules.iter().filter(|r| r.action_type == action_type);
        let wildcard = self
            .rules
            .iter()
            .filter(|r| r.action_type == "*" && action_type != "*");
        literal.chain(wildcard).collect()
    }
}

impl Rule {
    fn load(index: usize, raw: &Value) -> GatewayResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| malformed(format!("rule #{index} must be a JSON object")))?;

        let action_type = match obj.get("action_type") {
            None => "*".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(malformed(format!(
                    "rule #{index}: 'action_type' must be a string"
                )))
            }
        };

        let effect = match obj.get("effect") {
            None => Effect::Allow,
            Some(Value::String(s)) => Effect::parse(s, &format!("rule #{index}: 'effect'"))?,
            Some(_) => {
                return Err(malformed(format!(
                    "rule #{index}: 'effect' must be a string"
                )))
            }
        };

        let constraints = match obj.get("constraints") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(key, spec)| {
                    Constraint::load(index, key, spec).map(|c| (key.clone(), c))
                })
                .collect::<GatewayResult<Vec<_>>>()?,
            Some(_) => {
                return Err(malformed(format!(
                    "rule #{index}: 'constraints' must be an object"
                )))
            }
        };

        let allowed_agents = agent_list(obj.get("allowed_agents"), index, "allowed_agents")?;
        let blocked_agents = agent_list(obj.get("blocked_agents"), index, "blocked_agents")?;

        let rate_limit = match obj.get("rate_limit") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(RateLimit::load(index, raw)?),
        };
        let aggregate_limit = match obj.get("aggregate_limit") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(AggregateLimit::load(index, raw)?),
        };

        Ok(Self {
            identity: format!("{index}:{action_type}"),
            action_type,
            effect,
            constraints,
            allowed_agents,
            blocked_agents,
            rate_limit,
            aggregate_limit,
        })
    }
}

impl RateLimit {
    fn load(rule_index: usize, raw: &Value) -> GatewayResult<Self> {
        let obj = raw.as_object().ok_or_else(|| {
            malformed(format!("rule #{rule_index}: 'rate_limit' must be an object"))
        })?;
        let max_requests = positive_integer(
            obj.get("max_requests"),
            rule_index,
            "rate_limit.max_requests",
        )?;
        let window_seconds = positive_integer(
            obj.get("window_seconds"),
            rule_index,
            "rate_limit.window_seconds",
        )?;
        Ok(Self {
            max_requests,
            window_seconds,
        })
    }
}

impl AggregateLimit {
    fn load(rule_index: usize, raw: &Value) -> GatewayResult<Self> {
        let obj = raw.as_object().ok_or_else(|| {
            malformed(format!(
                "rule #{rule_index}: 'aggregate_limit' must be an object"
            ))
        })?;

        let field = match obj.get("field") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => {
                return Err(malformed(format!(
                    "rule #{rule_index}: 'aggregate_limit.field' must be a non-empty string"
                )))
            }
        };

        let max = obj
            .get("max")
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite())
            .ok_or_else(|| {
                malformed(format!(
                    "rule #{rule_index}: 'aggregate_limit.max' must be a number"
                ))
            })?;
        if max < 0.0 {
            return Err(malformed(format!(
                "rule #{rule_index}: 'aggregate_limit.max' must not be negative"
            )));
        }

        let window_seconds = positive_integer(
            obj.get("window_seconds"),
            rule_index,
            "aggregate_limit.window_seconds",
        )?;

        Ok(Self {
            field,
            max,
            window_seconds,
        })
    }
}

/// Constraint tags accepted by the loader, in canonical evaluation order.
const KNOWN_TAGS: &[&str] = &[
    "min",
    "max",
    "in",
    "not_in",
    "equals",
    "pattern",
    "not_pattern",
    "contains",
    "not_contains",
];

impl Constraint {
    fn load(rule_index: usize, key: &str, raw: &Value) -> GatewayResult<Self> {
        let obj = raw.as_object().ok_or_else(|| {
            malformed(format!(
                "rule #{rule_index}: constraint '{key}' must be a JSON object"
            ))
        })?;

        // Unknown tags are rejected at load time, never at evaluation.
        // "reason" is a modifier for not_pattern, not a predicate.
        for tag in obj.keys() {
            if tag != "reason" && !KNOWN_TAGS.contains(&tag.as_str()) {
                return Err(malformed(format!(
                    "rule #{rule_index}: unknown constraint tag '{tag}' on '{key}'"
                )));
            }
        }

        let bound = |tag: &str| -> GatewayResult<Option<f64>> {
            match obj.get(tag) {
                None => Ok(None),
                Some(v) => v
                    .as_f64()
                    .filter(|n| n.is_finite())
                    .map(Some)
                    .ok_or_else(|| {
                        malformed(format!(
                            "rule #{rule_index}: constraint '{key}': '{tag}' must be a number"
                        ))
                    }),
            }
        };
        let value_list = |tag: &str| -> GatewayResult<Option<Vec<Value>>> {
            match obj.get(tag) {
                None => Ok(None),
                Some(Value::Array(items)) => Ok(Some(items.clone())),
                Some(_) => Err(malformed(format!(
                    "rule #{rule_index}: constraint '{key}': '{tag}' must be an array"
                ))),
            }
        };
        let regex_for = |tag: &str| -> GatewayResult<Option<Regex>> {
            match obj.get(tag) {
                None => Ok(None),
                Some(Value::String(pattern)) => Regex::new(pattern).map(Some).map_err(|e| {
                    malformed(format!(
                        "rule #{rule_index}: constraint '{key}': invalid '{tag}' regex: {e}"
                    ))
                }),
                Some(_) => Err(malformed(format!(
                    "rule #{rule_index}: constraint '{key}': '{tag}' must be a string"
                ))),
            }
        };
        let substring = |tag: &str| -> GatewayResult<Option<String>> {
            match obj.get(tag) {
                None => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(malformed(format!(
                    "rule #{rule_index}: constraint '{key}': '{tag}' must be a string"
                ))),
            }
        };

        let mut predicates = Vec::new();
        if let Some(n) = bound("min")? {
            predicates.push(Predicate::Min(n));
        }
        if let Some(n) = bound("max")? {
            predicates.push(Predicate::Max(n));
        }
        if let Some(values) = value_list("in")? {
            predicates.push(Predicate::In(values));
        }
        if let Some(values) = value_list("not_in")? {
            predicates.push(Predicate::NotIn(values));
        }
        if let Some(value) = obj.get("equals") {
            predicates.push(Predicate::Equals(value.clone()));
        }
        if let Some(regex) = regex_for("pattern")? {
            predicates.push(Predicate::Pattern(regex));
        }
        if let Some(regex) = regex_for("not_pattern")? {
            predicates.push(Predicate::NotPattern {
                regex,
                reason: substring("reason")?,
            });
        }
        if let Some(s) = substring("contains")? {
            predicates.push(Predicate::Contains(s));
        }
        if let Some(s) = substring("not_contains")? {
            predicates.push(Predicate::NotContains(s));
        }

        Ok(Self { predicates })
    }
}

fn optional_string(raw: Option<&Value>, context: &str) -> GatewayResult<Option<String>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(malformed(format!("{context} must be a string"))),
    }
}

fn agent_list(
    raw: Option<&Value>,
    rule_index: usize,
    field: &str,
) -> GatewayResult<Option<Vec<String>>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut agents = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => agents.push(s.clone()),
                    _ => {
                        return Err(malformed(format!(
                            "rule #{rule_index}: '{field}' entries must be strings"
                        )))
                    }
                }
            }
            Ok(Some(agents))
        }
        Some(_) => Err(malformed(format!(
            "rule #{rule_index}: '{field}' must be an array of agent names"
        ))),
    }
}

fn positive_integer(raw: Option<&Value>, rule_index: usize, field: &str) -> GatewayResult<u64> {
    raw.and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            malformed(format!(
                "rule #{rule_index}: '{field}' must be a positive integer"
            ))
        })
}
