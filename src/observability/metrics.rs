//! Metrics recording.
//!
//! # Metrics
//! - `api_requests_total` (counter): completed exchanges by method, status
//! - `api_request_duration_seconds` (histogram): wall-clock latency by method
//! - `api_request_retries_total` (counter): transport retries by method
//! - `api_transport_failures_total` (counter): calls that ended in a transport error
//! - `api_assertions_total` (counter): assertion outcomes by check, result
//!
//! Values go to whatever `metrics` recorder the embedding test binary
//! installs; with none installed every call is a no-op.

use std::time::Duration;

use metrics::{counter, histogram};

/// Record a completed request/response exchange.
pub fn record_request(method: &str, status: u16, elapsed: Duration, attempts: u32) {
    counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("api_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
    if attempts > 1 {
        counter!("api_request_retries_total", "method" => method.to_string())
            .increment(u64::from(attempts - 1));
    }
}

/// Record a call that failed at the transport level.
pub fn record_transport_failure(method: &str) {
    counter!("api_transport_failures_total", "method" => method.to_string()).increment(1);
}

/// Record the outcome of an assertion check.
pub fn record_assertion(check: &'static str, passed: bool) {
    let result = if passed { "pass" } else { "fail" };
    counter!("api_assertions_total", "check" => check, "result" => result).increment(1);
}
