//! Dotted-path resolution and value comparison over JSON parameter trees.
//!
//! Paths are dot-separated segments interpreted left to right. Each segment
//! indexes an object key, or — when the segment parses as an integer — an
//! array element. A leading `params.` prefix is accepted and stripped, so
//! constraint keys may be written either way.
//!
//! Resolution treats an explicit JSON `null` the same as a missing segment:
//! both yield `None` (the *PathAbsent* state). Positive predicates treat
//! absence as a violation; blacklist-shaped predicates are vacuously
//! satisfied by it.

use serde_json::Value;

/// Longest rendered-value excerpt embedded in a block reason. Longer values
/// are cut so reasons never echo unbounded parameter content.
pub const REASON_VALUE_MAX_CHARS: usize = 80;

/// Resolve a dotted path against a parameter tree.
///
/// Returns `None` when any segment is missing, an array index does not
/// parse or is out of bounds, a scalar is indexed into, or the resolved
/// value is JSON `null`.
pub fn resolve<'a>(params: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("params.").unwrap_or(path);
    let mut current = params;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Structural equality with numeric promotion: `5` and `5.0` compare equal,
/// and the promotion applies recursively inside arrays and objects.
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| deep_eq(x, y)))
        }
        _ => a == b,
    }
}

/// The value as a finite `f64`, or `None` for non-numbers.
pub fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

/// Resolve a path and extract a finite numeric value. Used by aggregate
/// limits; any failure (absent path, non-numeric value) yields `None`.
pub fn numeric_at(params: &Value, path: &str) -> Option<f64> {
    resolve(params, path).and_then(finite_number)
}

/// Render a value for inclusion in a human-readable reason, as compact
/// JSON. Strings keep their quoting so a reason distinguishes `"5"` from
/// `5`.
pub fn render(value: &Value) -> String {
    truncate(&value.to_string())
}

/// Render a value as the plain-text subject for substring and screening
/// predicates (`contains`, `not_contains`, `not_pattern`). Strings yield
/// their content; other values yield compact JSON.
pub fn render_subject(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Cut a rendered value to [`REASON_VALUE_MAX_CHARS`] characters.
pub fn truncate(rendered: &str) -> String {
    if rendered.chars().count() <= REASON_VALUE_MAX_CHARS {
        rendered.to_string()
    } else {
        let head: String = rendered.chars().take(REASON_VALUE_MAX_CHARS - 3).collect();
        format!("{head}...")
    }
}
