use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Render a JSON value in canonical form: object keys sorted, compact
/// separators, array order preserved.
///
/// The canonical form is the hashing input for the audit chain and the
/// deterministic text source for embeddings, so it must be stable across
/// processes and releases.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // serde_json's display for numbers is already deterministic for a
        // given value (integers without exponent, shortest-roundtrip floats).
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // Escape through the serializer so control characters and quotes
            // match ordinary JSON output byte-for-byte.
            out.push_str(&serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}")));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_else(|_| format!("{key:?}")));
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

/// Format a UTC instant for canonical serialization: RFC 3339 with
/// nanosecond precision and a `Z` suffix.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
