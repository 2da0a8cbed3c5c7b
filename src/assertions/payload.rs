//! Domain checks on response payloads.
//!
//! These collect every problem they find before failing, so one run reports
//! all the mismatches in a record instead of the first one.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::assertions::checks::{context, fail, json_body, pass, resolve, CheckResult, JsonType};
use crate::assertions::path::JsonPath;
use crate::client::ApiResponse;

/// Pattern an address must match in [`assert_email_format`].
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

const PAGE_SIZE_KEYS: &[&str] = &["page_size", "limit", "per_page", "size"];
const TOTAL_COUNT_KEYS: &[&str] = &["total", "total_count", "count", "total_items"];
const CURRENT_PAGE_KEYS: &[&str] = &["page", "current_page", "page_number"];
const HAS_NEXT_KEYS: &[&str] = &["has_next", "has_next_page", "next_page_url"];
const ITEMS_KEYS: &[&str] = &["data", "items", "results", "records"];

const RATE_LIMIT_HEADERS: &[&str] = &["x-ratelimit-limit", "x-rate-limit-limit", "ratelimit-limit"];
const RATE_REMAINING_HEADERS: &[&str] = &[
    "x-ratelimit-remaining",
    "x-rate-limit-remaining",
    "ratelimit-remaining",
];
const RATE_RESET_HEADERS: &[&str] = &["x-ratelimit-reset", "x-rate-limit-reset", "ratelimit-reset"];

/// Check that every field exists and has the expected type, reporting all
/// missing fields and mismatches together.
pub fn assert_json_structure(response: &ApiResponse, expected: &[(&str, JsonType)]) -> CheckResult {
    let body = json_body("json_structure", response)?;
    let mut errors = Vec::new();

    for (path, expected_type) in expected {
        let found = JsonPath::parse(path)
            .ok()
            .and_then(|parsed| parsed.lookup(&body));
        match found {
            None => errors.push(format!("Missing field: {path}")),
            Some(value) if !expected_type.matches(value) => errors.push(format!(
                "Field '{path}': expected {expected_type}, got {}",
                JsonType::of(value)
            )),
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        return pass("json_structure", response, format!("{} fields match", expected.len()));
    }

    let structure: Map<String, Value> = expected
        .iter()
        .map(|(path, t)| (path.to_string(), json!(t.to_string())))
        .collect();
    Err(fail(
        "json_structure",
        Some(response),
        format!("JSON structure validation failed: {}", errors.join("; ")),
        context([
            ("expected_structure", Value::Object(structure)),
            ("structure_errors", json!(errors)),
        ]),
    ))
}

/// Bounds for [`assert_price_format`].
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRule {
    /// Path of the price value.
    pub field: String,
    /// Expected value of a top-level `currency` key, when one is present.
    pub currency: String,
    pub min: f64,
    pub max: Option<f64>,
}

impl Default for PriceRule {
    fn default() -> Self {
        Self {
            field: "price".to_string(),
            currency: "USD".to_string(),
            min: 0.0,
            max: None,
        }
    }
}

/// Check that a price is numeric, within bounds, has at most two decimal
/// places and matches the expected currency.
pub fn assert_price_format(response: &ApiResponse, rule: &PriceRule) -> CheckResult {
    let body = json_body("price_format", response)?;
    let value = resolve("price_format", response, &body, &rule.field)?;
    let mut errors = Vec::new();

    match value {
        Value::Number(number) => {
            let price = number.as_f64().unwrap_or_default();
            if price < rule.min {
                errors.push(format!("Price {price} is below minimum {}", rule.min));
            }
            if let Some(max) = rule.max {
                if price > max {
                    errors.push(format!("Price {price} exceeds maximum {max}"));
                }
            }
            let text = number.to_string();
            if let Some((_, fraction)) = text.split_once('.') {
                if fraction.len() > 2 {
                    errors.push(format!("Price has too many decimal places: {text}"));
                }
            }
        }
        other => errors.push(format!("Price must be numeric, got {}", JsonType::of(other))),
    }

    if let Some(currency) = body.get("currency") {
        if currency.as_str() != Some(rule.currency.as_str()) {
            errors.push(format!("Expected currency {}, got {currency}", rule.currency));
        }
    }

    if errors.is_empty() {
        return pass("price_format", response, format!("{value} {}", rule.currency));
    }
    Err(fail(
        "price_format",
        Some(response),
        format!("Price validation failed: {}", errors.join("; ")),
        context([
            ("price_field", json!(rule.field)),
            ("price_value", value.clone()),
            ("expected_currency", json!(rule.currency)),
            ("validation_errors", json!(errors)),
        ]),
    ))
}

/// Check that `field` holds a well-formed email address.
///
/// With `allow_empty`, a missing field, `null` or `""` passes.
pub fn assert_email_format(response: &ApiResponse, field: &str, allow_empty: bool) -> CheckResult {
    let body = json_body("email_format", response)?;
    let found = JsonPath::parse(field)
        .ok()
        .and_then(|parsed| parsed.lookup(&body));

    let email = match found {
        None if allow_empty => {
            return pass("email_format", response, format!("'{field}' absent, allowed"));
        }
        None => {
            return Err(fail(
                "email_format",
                Some(response),
                format!("Email field '{field}' not found in response"),
                context([("email_field", json!(field))]),
            ));
        }
        Some(Value::Null) => "",
        Some(Value::String(s)) => s.as_str(),
        Some(other) => {
            return Err(fail(
                "email_format",
                Some(response),
                format!("Invalid email format: {other}"),
                context([("email_field", json!(field)), ("email_value", other.clone())]),
            ));
        }
    };

    if email.is_empty() {
        if allow_empty {
            return pass("email_format", response, format!("'{field}' empty, allowed"));
        }
        return Err(fail(
            "email_format",
            Some(response),
            format!("Email field '{field}' is empty"),
            context([("email_field", json!(field))]),
        ));
    }

    let pattern = Regex::new(EMAIL_PATTERN).map_err(|e| {
        fail(
            "email_format",
            Some(response),
            format!("Invalid email pattern: {e}"),
            Map::new(),
        )
    })?;
    if pattern.is_match(email) {
        return pass("email_format", response, email.to_string());
    }
    Err(fail(
        "email_format",
        Some(response),
        format!("Invalid email format: {email}"),
        context([
            ("email_field", json!(field)),
            ("email_value", json!(email)),
            ("pattern", json!(EMAIL_PATTERN)),
        ]),
    ))
}

/// How a date string is parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DateFormat {
    /// RFC 3339 timestamps, plus offset-less `YYYY-MM-DDTHH:MM:SS[.f]` and
    /// plain `YYYY-MM-DD`, read as UTC.
    #[default]
    Iso8601,
    /// A `chrono` strftime pattern, read as UTC unless it carries an offset.
    Pattern(String),
}

impl DateFormat {
    fn parse(&self, text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match self {
            DateFormat::Iso8601 => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|e| {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                        .map(|naive| naive.and_utc())
                        .or_else(|_| date_at_midnight(text, "%Y-%m-%d"))
                        .map_err(|_| e)
                }),
            DateFormat::Pattern(pattern) => DateTime::parse_from_str(text, pattern)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| NaiveDateTime::parse_from_str(text, pattern).map(|n| n.and_utc()))
                .or_else(|_| date_at_midnight(text, pattern)),
        }
    }
}

impl std::fmt::Display for DateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateFormat::Iso8601 => f.write_str("ISO8601"),
            DateFormat::Pattern(pattern) => f.write_str(pattern),
        }
    }
}

fn date_at_midnight(text: &str, pattern: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(text, pattern)?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Constraints for [`assert_date_format`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRule {
    pub format: DateFormat,
    pub allow_future: bool,
    /// Oldest acceptable date, measured back from now.
    pub max_age: Option<Duration>,
}

impl Default for DateRule {
    fn default() -> Self {
        Self {
            format: DateFormat::Iso8601,
            allow_future: true,
            max_age: None,
        }
    }
}

/// Check that `field` holds a date in the expected format and window.
pub fn assert_date_format(response: &ApiResponse, field: &str, rule: &DateRule) -> CheckResult {
    let body = json_body("date_format", response)?;
    let value = resolve("date_format", response, &body, field)?;
    let text = value.as_str().unwrap_or_default();

    let parsed = match rule.format.parse(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Err(fail(
                "date_format",
                Some(response),
                format!("Invalid date format: {value}"),
                context([
                    ("date_field", json!(field)),
                    ("date_value", value.clone()),
                    ("expected_format", json!(rule.format.to_string())),
                    ("parse_error", json!(e.to_string())),
                ]),
            ));
        }
    };

    let now = Utc::now();
    let mut problem = None;
    if !rule.allow_future && parsed > now {
        problem = Some(format!("Future date not allowed: {text}"));
    } else if let Some(max_age) = rule.max_age {
        // Negative ages (future dates) never exceed the limit.
        if let Ok(age) = now.signed_duration_since(parsed).to_std() {
            if age > max_age {
                problem = Some(format!(
                    "Date {text} is older than {} seconds",
                    max_age.as_secs()
                ));
            }
        }
    }

    match problem {
        None => pass("date_format", response, text.to_string()),
        Some(message) => Err(fail(
            "date_format",
            Some(response),
            message,
            context([
                ("date_field", json!(field)),
                ("date_value", value.clone()),
                ("now", json!(now.to_rfc3339())),
            ]),
        )),
    }
}

/// Expected pagination metadata; `None` skips that comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: Option<u64>,
    pub total_count: Option<u64>,
    pub has_next: Option<bool>,
}

/// Check pagination metadata found under any of the common key names.
///
/// Comparisons whose keys are absent from the body are skipped.
pub fn assert_pagination_data(response: &ApiResponse, expected: &Pagination) -> CheckResult {
    let body = json_body("pagination", response)?;
    let page_size = first_key(&body, PAGE_SIZE_KEYS);
    let total_count = first_key(&body, TOTAL_COUNT_KEYS);
    let current_page = first_key(&body, CURRENT_PAGE_KEYS);
    let has_next = first_key(&body, HAS_NEXT_KEYS);
    let items = first_key(&body, ITEMS_KEYS);
    let mut errors = Vec::new();

    if let Some(expected_size) = expected.page_size {
        if let Some((_, Value::Array(items))) = items {
            if items.len() as u64 > expected_size {
                errors.push(format!("Too many items: {} > {expected_size}", items.len()));
            }
        }
        if let Some((_, actual)) = page_size {
            if actual.as_u64() != Some(expected_size) {
                errors.push(format!("Page size mismatch: {actual} != {expected_size}"));
            }
        }
    }

    if let (Some(expected_total), Some((_, actual))) = (expected.total_count, total_count) {
        if actual.as_u64() != Some(expected_total) {
            errors.push(format!("Total count mismatch: {actual} != {expected_total}"));
        }
    }

    if let (Some(expected_next), Some((_, actual))) = (expected.has_next, has_next) {
        if truthy(actual) != expected_next {
            errors.push(format!("Has next page mismatch: {actual} != {expected_next}"));
        }
    }

    if errors.is_empty() {
        return pass("pagination", response, "Pagination metadata matches".to_string());
    }

    let found: Map<String, Value> = [
        ("page_size", page_size),
        ("total_count", total_count),
        ("current_page", current_page),
        ("has_next", has_next),
        ("items", items),
    ]
    .into_iter()
    .filter_map(|(kind, hit)| hit.map(|(key, _)| (kind.to_string(), json!(key))))
    .collect();
    Err(fail(
        "pagination",
        Some(response),
        format!("Pagination validation failed: {}", errors.join("; ")),
        context([
            ("found_pagination_fields", Value::Object(found)),
            ("validation_errors", json!(errors)),
        ]),
    ))
}

fn first_key<'a>(body: &'a Value, keys: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    keys.iter()
        .find_map(|key| body.get(*key).map(|value| (*key, value)))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Check rate-limit headers against the expected limit and remaining count.
///
/// Also fails when remaining exceeds the limit or a header is not a number.
/// Headers that are absent are not compared.
pub fn assert_api_rate_limit(
    response: &ApiResponse,
    limit: Option<u64>,
    remaining: Option<u64>,
) -> CheckResult {
    let mut errors = Vec::new();
    let mut found = Map::new();
    let mut read = |kind: &str, names: &[&str]| -> Option<u64> {
        let (name, raw) = names
            .iter()
            .find_map(|name| response.header(name).map(|value| (*name, value)))?;
        found.insert(kind.to_string(), json!({ "name": name, "value": raw }));
        match raw.trim().parse::<u64>() {
            Ok(value) => Some(value),
            Err(_) => {
                errors.push(format!("Rate limit header '{name}' is not a number: {raw}"));
                None
            }
        }
    };

    let actual_limit = read("limit", RATE_LIMIT_HEADERS);
    let actual_remaining = read("remaining", RATE_REMAINING_HEADERS);
    read("reset", RATE_RESET_HEADERS);

    if let (Some(expected), Some(actual)) = (limit, actual_limit) {
        if actual != expected {
            errors.push(format!("Rate limit mismatch: {actual} != {expected}"));
        }
    }
    if let (Some(expected), Some(actual)) = (remaining, actual_remaining) {
        if actual != expected {
            errors.push(format!("Remaining requests mismatch: {actual} != {expected}"));
        }
    }
    if let (Some(limit), Some(remaining)) = (actual_limit, actual_remaining) {
        if remaining > limit {
            errors.push(format!("Remaining ({remaining}) cannot exceed limit ({limit})"));
        }
    }

    if errors.is_empty() {
        return pass("rate_limit", response, "Rate limit headers valid".to_string());
    }
    Err(fail(
        "rate_limit",
        Some(response),
        format!("Rate limit validation failed: {}", errors.join("; ")),
        context([
            ("found_rate_limit_headers", Value::Object(found)),
            ("validation_errors", json!(errors)),
        ]),
    ))
}

/// Check that `path` holds the same value in every response.
///
/// Numbers may differ from the first response's value by at most
/// `tolerance`; anything else must be equal.
pub fn assert_data_consistency(responses: &[ApiResponse], path: &str, tolerance: f64) -> CheckResult {
    const CHECK: &str = "data_consistency";

    if responses.len() < 2 {
        return Err(fail(
            CHECK,
            None,
            "Need at least 2 responses to check consistency".to_string(),
            context([("responses", json!(responses.len()))]),
        ));
    }

    let parsed = JsonPath::parse(path).map_err(|e| {
        fail(CHECK, None, e.to_string(), context([("path", json!(path))]))
    })?;

    let mut values = Vec::with_capacity(responses.len());
    let mut errors = Vec::new();
    for (index, response) in responses.iter().enumerate() {
        match response.json() {
            Ok(body) => match parsed.lookup(&body) {
                Some(value) => values.push((index, value.clone())),
                None => errors.push(format!("Response {index}: field '{path}' not found")),
            },
            Err(_) => errors.push(format!("Response {index}: invalid JSON")),
        }
    }
    if !errors.is_empty() {
        return Err(fail(
            CHECK,
            None,
            format!("Data consistency check failed: {}", errors.join("; ")),
            context([("path", json!(path))]),
        ));
    }

    let reference = values[0].1.clone();
    let inconsistencies: Vec<String> = values[1..]
        .iter()
        .filter(|(_, value)| !consistent(&reference, value, tolerance))
        .map(|(index, value)| format!("Response {index}: {value} differs from reference {reference}"))
        .collect();

    if inconsistencies.is_empty() {
        return pass(
            CHECK,
            &responses[0],
            format!("{} responses agree on '{path}'", values.len()),
        );
    }
    Err(fail(
        CHECK,
        None,
        format!("Data inconsistency detected: {}", inconsistencies.join("; ")),
        context([
            ("path", json!(path)),
            ("reference_value", reference),
            ("all_values", json!(values.iter().map(|(_, v)| v).collect::<Vec<_>>())),
            ("tolerance", json!(tolerance)),
            ("inconsistencies", json!(inconsistencies)),
        ]),
    ))
}

fn consistent(reference: &Value, value: &Value, tolerance: f64) -> bool {
    match (reference.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() <= tolerance,
        _ => reference == value,
    }
}
