//! Redaction of sensitive values before they reach the logs.

use std::collections::BTreeMap;

use serde_json::Value;

/// Placeholder written in place of a redacted value.
pub const REDACTED: &str = "***REDACTED***";

const SENSITIVE_HEADER_PARTS: &[&str] = &[
    "authorization",
    "x-api-key",
    "api-key",
    "access-token",
    "refresh-token",
    "jwt",
    "bearer",
    "secret",
    "password",
    "cookie",
];

const SENSITIVE_BODY_PARTS: &[&str] = &["password", "secret", "token", "key", "credential"];

fn is_sensitive(name: &str, parts: &[&str]) -> bool {
    let lower = name.to_ascii_lowercase();
    parts.iter().any(|part| lower.contains(part))
}

/// Copy of `headers` with sensitive values replaced by [`REDACTED`].
pub fn redact_headers<'a, I>(headers: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .map(|(name, value)| {
            let value = if is_sensitive(name, SENSITIVE_HEADER_PARTS) {
                REDACTED.to_string()
            } else {
                value.to_string()
            };
            (name.to_string(), value)
        })
        .collect()
}

/// Copy of `body` with sensitive object keys redacted at every depth.
pub fn redact_body(body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = if is_sensitive(key, SENSITIVE_BODY_PARTS) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_body(value)
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_body).collect()),
        other => other.clone(),
    }
}

/// Truncate `text` to at most `limit` characters, appending `...` when cut.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
