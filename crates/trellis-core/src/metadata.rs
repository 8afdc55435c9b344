//! Metadata bag helpers.
//!
//! Edge metadata is an open `serde_json` object. Persistence compares and
//! stores metadata through [`stable_stringify`], which sorts keys
//! recursively so two bags with identical contents always serialize to the
//! same bytes no matter how they were built.

use serde_json::{Map, Value};

/// The open metadata bag carried by every edge.
pub type Metadata = Map<String, Value>;

/// Compact JSON with recursively sorted object keys.
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// [`stable_stringify`] over a bare metadata map.
pub fn stable_stringify_map(map: &Metadata) -> String {
    let mut out = String::new();
    write_object(&mut out, map);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => write_object(out, map),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        // Scalars already have a canonical compact form.
        other => out.push_str(&other.to_string()),
    }
}

fn write_object(out: &mut String, map: &Map<String, Value>) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String((*key).clone()).to_string());
        out.push(':');
        write_value(out, &map[key.as_str()]);
    }
    out.push('}');
}

/// Trimmed, length-capped string sanitizer. Non-strings and blank strings
/// are treated as absent.
pub fn as_clean_string(value: &Value, max_chars: usize) -> Option<String> {
    let s = value.as_str()?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().count() > max_chars {
        Some(s.chars().take(max_chars).collect())
    } else {
        Some(s.to_string())
    }
}

/// Boolean coercion accepting `true`/`false` and their string forms.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Non-negative integer coercion: floats are floored, negatives clamp to 0,
/// non-finite values are absent.
pub fn as_uint(value: &Value) -> Option<u32> {
    let n = value.as_f64()?;
    if !n.is_finite() {
        return None;
    }
    let floored = n.floor();
    if floored <= 0.0 {
        Some(0)
    } else if floored >= u32::MAX as f64 {
        Some(u32::MAX)
    } else {
        Some(floored as u32)
    }
}

/// Confidence coercion: finite numbers clamped into [0, 1].
pub fn as_confidence(value: &Value) -> Option<f64> {
    let n = value.as_f64()?;
    if !n.is_finite() {
        return None;
    }
    Some(n.clamp(0.0, 1.0))
}
