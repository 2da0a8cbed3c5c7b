//! Request/response log events.
//!
//! All events use the `api_testkit::exchange` target so the logging setup can
//! route them to the one-line-per-event JSON file.

use reqwest::Method;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::client::{ApiResponse, RequestBody, RequestRecord};
use crate::observability::sanitize::{redact_body, redact_headers, truncate};

/// Target of every request/response event.
pub const EXCHANGE_TARGET: &str = "api_testkit::exchange";

/// Maximum number of body characters written to a log line.
pub const BODY_PREVIEW_CHARS: usize = 500;

/// Log an outgoing request before it is sent.
pub fn log_request(record: &RequestRecord, request_id: Uuid, sanitize: bool) {
    let headers = if sanitize {
        redact_headers(record.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    } else {
        record.headers.clone()
    };
    let body = record
        .body
        .as_ref()
        .map(|body| body_preview(body, sanitize))
        .unwrap_or_default();

    tracing::info!(
        target: EXCHANGE_TARGET,
        request_id = %request_id,
        method = %record.method,
        url = %record.url,
        headers = ?headers,
        body = %body,
        "API request"
    );
}

/// Log an inbound response; the level follows the status class.
pub fn log_response(response: &ApiResponse) {
    let body = truncate(&response.text(), BODY_PREVIEW_CHARS);
    let elapsed_ms = response.elapsed().as_secs_f64() * 1000.0;
    let status = response.status();

    match status {
        500..=u16::MAX => tracing::error!(
            target: EXCHANGE_TARGET,
            request_id = %response.request_id(),
            status,
            elapsed_ms,
            attempts = response.attempts(),
            url = %response.url(),
            body = %body,
            "API response"
        ),
        400..=499 => tracing::warn!(
            target: EXCHANGE_TARGET,
            request_id = %response.request_id(),
            status,
            elapsed_ms,
            attempts = response.attempts(),
            url = %response.url(),
            body = %body,
            "API response"
        ),
        _ => tracing::info!(
            target: EXCHANGE_TARGET,
            request_id = %response.request_id(),
            status,
            elapsed_ms,
            attempts = response.attempts(),
            url = %response.url(),
            body = %body,
            "API response"
        ),
    }
}

/// Log a call that ended without a response.
pub fn log_transport_failure(method: &Method, url: &Url, request_id: Uuid, error: &dyn std::error::Error) {
    tracing::error!(
        target: EXCHANGE_TARGET,
        request_id = %request_id,
        method = %method,
        url = %url,
        error = %error,
        "Request failed"
    );
}

fn body_preview(body: &RequestBody, sanitize: bool) -> String {
    match body {
        RequestBody::Json(value) => {
            let value: Value = if sanitize { redact_body(value) } else { value.clone() };
            truncate(&value.to_string(), BODY_PREVIEW_CHARS)
        }
        RequestBody::Raw(bytes) => truncate(&String::from_utf8_lossy(bytes), BODY_PREVIEW_CHARS),
    }
}
