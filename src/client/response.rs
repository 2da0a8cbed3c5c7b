//! Buffered response returned from every call.

use std::borrow::Cow;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

/// A fully-read HTTP response plus the metadata of the exchange.
///
/// Owned and immutable once returned; assertions only ever borrow it.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    elapsed: Duration,
    url: Url,
    method: Method,
    request_id: Uuid,
    attempts: u32,
}

impl ApiResponse {
    /// Create a response with no headers and an empty body.
    ///
    /// Mostly useful for building fakes; the client constructs real ones.
    pub fn new(method: Method, url: Url, status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
            elapsed: Duration::ZERO,
            url,
            method,
            request_id: Uuid::new_v4(),
            attempts: 1,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_exchange(
        method: Method,
        url: Url,
        status: StatusCode,
        headers: HeaderMap,
        body: Vec<u8>,
        elapsed: Duration,
        request_id: Uuid,
        attempts: u32,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            elapsed,
            url,
            method,
            request_id,
            attempts,
        }
    }

    /// Add a header. Pairs that are not valid HTTP headers are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and the matching content type.
    pub fn with_json(self, body: &Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value by case-insensitive name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Wall-clock time of the whole call, retries included.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Correlation ID attached to the request and its log events.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Number of transport attempts, 1 when no retry happened.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
