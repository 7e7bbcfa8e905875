/// Template reference resolution
///
/// Node fields may reference earlier outputs with `{{a.b.c}}` expressions.
/// Resolution runs against the plain-JSON variable snapshot of the current
/// execution; all context values are structural data, so there is no
/// object-model unwrapping anywhere in this path.
///
/// Rules:
/// - a string that is exactly one `{{path}}` resolves to the referenced
///   value with its type preserved (objects stay objects);
/// - embedded references interpolate as strings;
/// - a missing path yields null for an exact match, the empty string inside
///   an interpolation.

use serde_json::{Map, Value};

/// Recursively resolve every template reference inside `value`.
pub fn resolve(value: &Value, vars: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => resolve_string(s, vars),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, vars)).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), resolve(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve references inside a whole field map (convenience for handlers).
pub fn resolve_fields(fields: &Map<String, Value>, vars: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), resolve(v, vars)))
        .collect()
}

fn resolve_string(s: &str, vars: &Map<String, Value>) -> Value {
    let trimmed = s.trim();
    // Exact match keeps the referenced value's type.
    if let Some(path) = exact_reference(trimmed) {
        return lookup(path, vars).cloned().unwrap_or(Value::Null);
    }
    if !s.contains("{{") {
        return Value::String(s.to_string());
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let path = after[..close].trim();
                match lookup(path, vars) {
                    Some(Value::String(v)) => out.push_str(v),
                    Some(Value::Null) | None => {}
                    Some(other) => out.push_str(&other.to_string()),
                }
                rest = &after[close + 2..];
            }
            None => {
                // Unterminated reference: keep the literal remainder.
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Value::String(out)
}

/// Returns the inner path when `s` is exactly one `{{...}}` reference.
fn exact_reference(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

/// Dot-path navigation over the vars snapshot: "user.name" walks
/// vars["user"]["name"]. Array indices are accepted as numeric segments.
fn lookup<'a>(path: &str, vars: &'a Map<String, Value>) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = vars.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(obj) => obj.get(part)?,
            Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
