//! Response checks.
//!
//! Every check borrows the response, logs a pass at `info`, or logs the full
//! failure context at `error` and returns an [`AssertionFailure`]. Checks never
//! mutate the response, so running one twice only duplicates log lines.

use std::fmt;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::assertions::failure::AssertionFailure;
use crate::assertions::path::JsonPath;
use crate::client::ApiResponse;
use crate::observability::exchange::BODY_PREVIEW_CHARS;
use crate::observability::metrics;
use crate::observability::sanitize::truncate;

/// Result of a single check.
pub type CheckResult<T = ()> = Result<T, AssertionFailure>;

/// Headers checked by [`assert_security_headers`] when none are given.
pub const DEFAULT_SECURITY_HEADERS: &[&str] =
    &["X-Content-Type-Options", "X-Frame-Options", "X-XSS-Protection"];

/// Expected JSON type for [`assert_json_types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Bool,
    /// Any number, integral or not.
    Number,
    /// A number with no fractional part.
    Integer,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            other => Self::of(value) == other,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

pub fn assert_status_code(response: &ApiResponse, expected: u16) -> CheckResult {
    let actual = response.status();
    if actual == expected {
        return pass("status_code", response, format!("Status code {actual}"));
    }
    Err(fail(
        "status_code",
        Some(response),
        format!("Expected status code {expected}, got {actual}"),
        context([("expected_status", json!(expected)), ("actual_status", json!(actual))]),
    ))
}

pub fn assert_status_code_in(response: &ApiResponse, expected: &[u16]) -> CheckResult {
    let actual = response.status();
    if expected.contains(&actual) {
        return pass("status_code_in", response, format!("Status code {actual}"));
    }
    Err(fail(
        "status_code_in",
        Some(response),
        format!("Expected status code in {expected:?}, got {actual}"),
        context([
            ("expected_statuses", json!(expected)),
            ("actual_status", json!(actual)),
        ]),
    ))
}

/// Compare the media type of `Content-Type`, ignoring parameters after `;`.
pub fn assert_content_type(response: &ApiResponse, expected: &str) -> CheckResult {
    let actual = response
        .header("content-type")
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .unwrap_or_default();
    if actual.eq_ignore_ascii_case(expected) {
        return pass("content_type", response, format!("Content-Type {actual}"));
    }
    Err(fail(
        "content_type",
        Some(response),
        format!("Expected Content-Type {expected}, got {actual}"),
        context([("expected", json!(expected)), ("actual", json!(actual))]),
    ))
}

/// Check the measured elapsed time of `response`.
pub fn assert_response_time(response: &ApiResponse, max: Duration) -> CheckResult {
    let actual = response.elapsed();
    if actual <= max {
        return pass(
            "response_time",
            response,
            format!("Response time {:.3}s", actual.as_secs_f64()),
        );
    }
    Err(fail(
        "response_time",
        Some(response),
        format!(
            "Response time {:.3}s exceeded limit {:.3}s",
            actual.as_secs_f64(),
            max.as_secs_f64()
        ),
        time_context(actual, max),
    ))
}

/// Check a duration measured elsewhere.
pub fn assert_elapsed(elapsed: Duration, max: Duration) -> CheckResult {
    if elapsed <= max {
        metrics::record_assertion("elapsed", true);
        tracing::info!(
            check = "elapsed",
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Assertion passed"
        );
        return Ok(());
    }
    Err(fail(
        "elapsed",
        None,
        format!(
            "Elapsed time {:.3}s exceeded limit {:.3}s",
            elapsed.as_secs_f64(),
            max.as_secs_f64()
        ),
        time_context(elapsed, max),
    ))
}

/// Validate the body against a JSON Schema.
///
/// The failure message carries the first violation; all of them go into the
/// `errors` context entry with their instance paths.
pub fn assert_json_schema(response: &ApiResponse, schema: &Value) -> CheckResult {
    let body = json_body("json_schema", response)?;
    let validator = jsonschema::validator_for(schema).map_err(|e| {
        fail(
            "json_schema",
            Some(response),
            format!("Invalid JSON schema: {e}"),
            Map::new(),
        )
    })?;

    let errors: Vec<(String, String)> = validator
        .iter_errors(&body)
        .map(|e| (e.instance_path.to_string(), e.to_string()))
        .collect();

    let Some((path, message)) = errors.first() else {
        return pass("json_schema", response, "JSON schema validation".to_string());
    };

    let location = if path.is_empty() { "/" } else { path.as_str() };
    let all: Vec<Value> = errors
        .iter()
        .map(|(path, message)| json!({ "path": path, "message": message }))
        .collect();
    Err(fail(
        "json_schema",
        Some(response),
        format!("Schema validation failed at {location}: {message}"),
        context([("errors", Value::Array(all))]),
    ))
}

/// Check that `path` resolves, returning the value found there.
pub fn assert_json_key_exists(response: &ApiResponse, path: &str) -> CheckResult<Value> {
    let body = json_body("json_key_exists", response)?;
    let found = resolve("json_key_exists", response, &body, path)?;
    pass("json_key_exists", response, format!("Key '{path}' exists"))?;
    Ok(found.clone())
}

pub fn assert_json_key_value(response: &ApiResponse, path: &str, expected: &Value) -> CheckResult {
    let body = json_body("json_key_value", response)?;
    let actual = resolve("json_key_value", response, &body, path)?;
    if actual == expected {
        return pass("json_key_value", response, format!("'{path}' = {actual}"));
    }
    Err(fail(
        "json_key_value",
        Some(response),
        format!("Expected '{path}' = {expected}, got {actual}"),
        context([
            ("path", json!(path)),
            ("expected", expected.clone()),
            ("actual", actual.clone()),
        ]),
    ))
}

/// Check that every top-level key of `expected` is present with an equal
/// value. Extra keys in the response are ignored.
pub fn assert_json_contains(response: &ApiResponse, expected: &Map<String, Value>) -> CheckResult {
    let body = json_body("json_contains", response)?;
    let actual = body.as_object();

    let mut missing = Vec::new();
    let mut mismatched = Vec::new();
    for (key, value) in expected {
        match actual.and_then(|map| map.get(key)) {
            None => missing.push(key.clone()),
            Some(found) if found != value => mismatched.push(key.clone()),
            Some(_) => {}
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        return pass("json_contains", response, "Response contains expected data".to_string());
    }
    Err(fail(
        "json_contains",
        Some(response),
        format!(
            "Response doesn't contain expected data. Missing: {missing:?}, value mismatch: {mismatched:?}"
        ),
        context([
            ("expected", Value::Object(expected.clone())),
            ("missing_keys", json!(missing)),
            ("mismatched_keys", json!(mismatched)),
        ]),
    ))
}

pub fn assert_header_exists(response: &ApiResponse, name: &str) -> CheckResult {
    if response.headers().contains_key(name) {
        return pass("header_exists", response, format!("Header '{name}' exists"));
    }
    Err(fail(
        "header_exists",
        Some(response),
        format!("Header '{name}' not found in response"),
        context([("header", json!(name)), ("headers", header_names(response))]),
    ))
}

pub fn assert_header_value(response: &ApiResponse, name: &str, expected: &str) -> CheckResult {
    let actual = response.header(name);
    if actual == Some(expected) {
        return pass("header_value", response, format!("Header '{name}' = {expected}"));
    }
    Err(fail(
        "header_value",
        Some(response),
        format!("Expected header '{name}' = {expected}, got {actual:?}"),
        context([
            ("header", json!(name)),
            ("expected", json!(expected)),
            ("actual", json!(actual)),
        ]),
    ))
}

pub fn assert_text_contains(response: &ApiResponse, expected: &str, case_sensitive: bool) -> CheckResult {
    let text = response.text();
    let found = if case_sensitive {
        text.contains(expected)
    } else {
        text.to_lowercase().contains(&expected.to_lowercase())
    };
    if found {
        return pass("text_contains", response, format!("Text contains '{expected}'"));
    }
    Err(fail(
        "text_contains",
        Some(response),
        format!("Text '{expected}' not found in response"),
        context([
            ("expected", json!(expected)),
            ("case_sensitive", json!(case_sensitive)),
        ]),
    ))
}

pub fn assert_json_array_length(response: &ApiResponse, path: &str, expected: usize) -> CheckResult {
    let body = json_body("json_array_length", response)?;
    let found = resolve("json_array_length", response, &body, path)?;
    let Some(items) = found.as_array() else {
        return Err(fail(
            "json_array_length",
            Some(response),
            format!("Data at path '{path}' is not an array"),
            context([("path", json!(path)), ("actual_type", json!(JsonType::of(found).to_string()))]),
        ));
    };

    let actual = items.len();
    if actual == expected {
        return pass("json_array_length", response, format!("'{path}' has {actual} items"));
    }
    Err(fail(
        "json_array_length",
        Some(response),
        format!("Expected array length {expected}, got {actual}"),
        context([
            ("path", json!(path)),
            ("expected", json!(expected)),
            ("actual", json!(actual)),
        ]),
    ))
}

/// Check the JSON type at several paths; fails on the first mismatch.
pub fn assert_json_types(response: &ApiResponse, types: &[(&str, JsonType)]) -> CheckResult {
    let body = json_body("json_types", response)?;
    for (path, expected) in types {
        let value = resolve("json_types", response, &body, path)?;
        if !expected.matches(value) {
            let actual = JsonType::of(value);
            return Err(fail(
                "json_types",
                Some(response),
                format!("Expected '{path}' to be {expected}, got {actual}"),
                context([
                    ("path", json!(path)),
                    ("expected", json!(expected.to_string())),
                    ("actual", json!(actual.to_string())),
                ]),
            ));
        }
    }
    pass("json_types", response, format!("{} type checks", types.len()))
}

/// Check that every header in `required` is present, or
/// [`DEFAULT_SECURITY_HEADERS`] when `required` is empty.
pub fn assert_security_headers(response: &ApiResponse, required: &[&str]) -> CheckResult {
    let required = if required.is_empty() {
        DEFAULT_SECURITY_HEADERS
    } else {
        required
    };

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !response.headers().contains_key(*name))
        .collect();

    if missing.is_empty() {
        return pass("security_headers", response, "Security headers present".to_string());
    }
    Err(fail(
        "security_headers",
        Some(response),
        format!("Missing security headers: {}", missing.join(", ")),
        context([
            ("required_headers", json!(required)),
            ("missing_headers", json!(missing)),
        ]),
    ))
}

pub(super) fn pass(check: &'static str, response: &ApiResponse, detail: String) -> CheckResult {
    metrics::record_assertion(check, true);
    tracing::info!(
        check,
        request_id = %response.request_id(),
        detail = %detail,
        "Assertion passed"
    );
    Ok(())
}

/// Build the failure, fill in the response context and log it.
pub(super) fn fail(
    check: &'static str,
    response: Option<&ApiResponse>,
    message: String,
    mut context: Map<String, Value>,
) -> AssertionFailure {
    if let Some(response) = response {
        context.insert("url".to_string(), json!(response.url().as_str()));
        context.insert("method".to_string(), json!(response.method().as_str()));
        context.insert(
            "response_body".to_string(),
            json!(truncate(&response.text(), BODY_PREVIEW_CHARS)),
        );
    }

    metrics::record_assertion(check, false);
    let logged = Value::Object(context.clone());
    tracing::error!(
        check,
        failure = %message,
        context = %logged,
        "Assertion failed"
    );

    context
        .into_iter()
        .fold(AssertionFailure::new(message), |failure, (key, value)| {
            failure.with_context(&key, value)
        })
}

pub(super) fn json_body(check: &'static str, response: &ApiResponse) -> CheckResult<Value> {
    response.json().map_err(|e| {
        fail(
            check,
            Some(response),
            "Response is not valid JSON".to_string(),
            context([("parse_error", json!(e.to_string()))]),
        )
    })
}

pub(super) fn resolve<'a>(
    check: &'static str,
    response: &ApiResponse,
    body: &'a Value,
    path: &str,
) -> CheckResult<&'a Value> {
    let parsed = JsonPath::parse(path).map_err(|e| {
        fail(
            check,
            Some(response),
            e.to_string(),
            context([("path", json!(path))]),
        )
    })?;
    parsed.lookup(body).ok_or_else(|| {
        fail(
            check,
            Some(response),
            format!("Key '{path}' not found in response"),
            context([("path", json!(path))]),
        )
    })
}

pub(super) fn context<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn time_context(actual: Duration, max: Duration) -> Map<String, Value> {
    context([
        ("actual_seconds", json!(actual.as_secs_f64())),
        ("max_seconds", json!(max.as_secs_f64())),
    ])
}

fn header_names(response: &ApiResponse) -> Value {
    json!(response
        .headers()
        .keys()
        .map(|name| name.as_str())
        .collect::<Vec<_>>())
}
