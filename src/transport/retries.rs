//! Retry policy.
//!
//! # Responsibilities
//! - Decide whether a method / status / error qualifies for a retry
//! - Compute the delay before each retry (backoff or `Retry-After`)
//!
//! # Design Decisions
//! - PATCH is never retried; POST is, matching the test-client defaults
//! - Connection errors and timeouts are always retryable
//! - `Retry-After` (delta seconds) wins over computed backoff on 429/503

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Method;

use crate::config::Settings;
use crate::transport::backoff::calculate_backoff;

/// Statuses that trigger a transport-level retry.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound for a single backoff sleep.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Bounded retry policy applied by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `total_retries + 1`.
    pub total_retries: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
    pub status_forcelist: Vec<u16>,
    pub allowed_methods: Vec<Method>,
    pub respect_retry_after: bool,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            total_retries: 3,
            backoff_factor: Duration::from_secs(1),
            max_backoff: DEFAULT_MAX_BACKOFF,
            status_forcelist: RETRYABLE_STATUS_CODES.to_vec(),
            allowed_methods: vec![
                Method::HEAD,
                Method::GET,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
                Method::TRACE,
                Method::POST,
            ],
            respect_retry_after: true,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Policy driven by the configured `retry_count` and `retry_delay`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            total_retries: settings.retry_count,
            backoff_factor: settings.retry_delay,
            ..Self::default()
        }
    }

    /// A policy that sends every request exactly once.
    pub fn none() -> Self {
        Self {
            total_retries: 0,
            ..Self::default()
        }
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    /// Connection failures and timeouts qualify; everything else is final.
    pub fn is_retryable_error(&self, error: &reqwest::Error) -> bool {
        error.is_connect() || error.is_timeout()
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32, status: Option<u16>, headers: Option<&HeaderMap>) -> Duration {
        if self.respect_retry_after && matches!(status, Some(429 | 503)) {
            if let Some(delay) = headers.and_then(retry_after) {
                return delay.min(self.max_backoff);
            }
        }
        calculate_backoff(retry, self.backoff_factor, self.max_backoff, self.jitter)
    }
}

/// Parse a `Retry-After` header given in delta seconds.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
