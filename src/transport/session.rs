//! Pooled HTTP session with transparent retries.
//!
//! # Responsibilities
//! - Own the `reqwest::Client` connection pool
//! - Re-send retryable requests according to the [`RetryPolicy`]
//! - Surface exhausted retries and network failures as [`TransportError`]
//!
//! HTTP error statuses that are not retried come back as ordinary responses.

use std::time::Duration;

use reqwest::{Client, Method, Request, Response};
use thiserror::Error;

use crate::transport::retries::RetryPolicy;

const USER_AGENT: &str = concat!("api-testkit/", env!("CARGO_PKG_VERSION"));

/// Errors raised by the transport after retries are exhausted.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure (DNS, refused connection, timeout), unchanged.
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    /// Every attempt returned a retryable status.
    #[error("Max retries exceeded for {method} {url}: status {last_status} after {attempts} attempts")]
    RetriesExhausted {
        method: Method,
        url: String,
        attempts: u32,
        last_status: u16,
    },
}

/// A response together with the number of attempts it took.
#[derive(Debug)]
pub struct Delivered {
    pub response: Response,
    pub attempts: u32,
}

/// Reusable connection pool bound to a retry policy.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    policy: RetryPolicy,
}

impl Transport {
    /// Build a pooled client with `timeout` as the default per-request deadline.
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, policy })
    }

    /// Underlying client, used to build requests.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying per policy.
    pub async fn execute(&self, request: Request) -> Result<Delivered, TransportError> {
        let method = request.method().clone();
        let url = request.url().to_string();
        let retry_allowed = self.policy.allows_method(&method);

        let mut retries = 0u32;
        let mut pending = request;

        loop {
            let can_retry = retry_allowed && retries < self.policy.total_retries;
            let next = if can_retry { pending.try_clone() } else { None };
            let attempts = retries + 1;

            match self.client.execute(pending).await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !retry_allowed || !self.policy.is_retryable_status(status) {
                        return Ok(Delivered { response, attempts });
                    }

                    if retries >= self.policy.total_retries {
                        tracing::error!(
                            method = %method,
                            url = %url,
                            attempts,
                            status,
                            "Retries exhausted"
                        );
                        return Err(TransportError::RetriesExhausted {
                            method,
                            url,
                            attempts,
                            last_status: status,
                        });
                    }

                    let Some(next_request) = next else {
                        // Streaming bodies cannot be replayed.
                        return Ok(Delivered { response, attempts });
                    };

                    retries += 1;
                    let delay = self
                        .policy
                        .delay_for(retries, Some(status), Some(response.headers()));
                    tracing::info!(
                        method = %method,
                        url = %url,
                        attempt = attempts,
                        delay = ?delay,
                        status,
                        "Retrying request"
                    );
                    drop(response);
                    tokio::time::sleep(delay).await;
                    pending = next_request;
                }
                Err(e) => {
                    let next_request = match next {
                        Some(next_request) if self.policy.is_retryable_error(&e) => next_request,
                        _ => return Err(TransportError::Request(e)),
                    };

                    retries += 1;
                    let delay = self.policy.delay_for(retries, None, None);
                    tracing::info!(
                        method = %method,
                        url = %url,
                        attempt = attempts,
                        delay = ?delay,
                        error = %e,
                        "Retrying after network error"
                    );
                    tokio::time::sleep(delay).await;
                    pending = next_request;
                }
            }
        }
    }
}
