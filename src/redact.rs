//! Sensitive-value redaction for request logging.
//!
//! Header and body values matching a fixed denylist are replaced with a
//! marker before anything reaches the log sink. Body redaction checks
//! top-level object keys only; nested structures pass through untouched.

use http::HeaderMap;
use serde_json::{Map, Value};

/// Replacement for redacted values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Header names whose values are never logged. `HeaderMap` stores names
/// lowercased, so a plain comparison is case-insensitive.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "x-api-key"];

/// Top-level body keys whose values are never logged.
const SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret", "key"];

/// Render headers as a JSON object with sensitive values masked.
pub fn redact_headers(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for (name, value) in headers {
        let rendered = if SENSITIVE_HEADERS.contains(&name.as_str()) {
            REDACTION_MARKER.to_string()
        } else {
            value.to_str().unwrap_or("<non-utf8>").to_string()
        };
        out.insert(name.as_str().to_string(), Value::String(rendered));
    }
    Value::Object(out)
}

/// Mask sensitive top-level fields of a JSON body.
///
/// Non-object bodies are returned unchanged.
pub fn redact_body(body: &Value) -> Value {
    let Value::Object(map) = body else {
        return body.clone();
    };
    let mut out = map.clone();
    for field in SENSITIVE_FIELDS {
        if let Some(slot) = out.get_mut(*field) {
            *slot = Value::String(REDACTION_MARKER.to_string());
        }
    }
    Value::Object(out)
}
