//! Request dispatcher.
//!
//! # Responsibilities
//! - Resolve endpoints against the configured base URL
//! - Merge persistent default headers with per-call headers
//! - Apply the current configured timeout unless the call overrides it
//! - Log every exchange and record its metrics
//!
//! # Data Flow
//! ```text
//! request(method, endpoint, options)
//!     → url.rs (absolute URL + query)
//!     → header merge (per-call wins)
//!     → exchange.rs (request event, request_id assigned)
//!     → Transport::execute (retries, backoff)
//!     → body read, elapsed measured
//!     → exchange.rs (response event) + metrics.rs
//!     → ApiResponse
//! ```

use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Request};
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::client::request::{RequestBody, RequestOptions, RequestRecord};
use crate::client::response::ApiResponse;
use crate::client::url::build_url;
use crate::config::{Config, Settings};
use crate::error::{Error, Result};
use crate::observability::exchange::{log_request, log_response, log_transport_failure};
use crate::observability::metrics;
use crate::transport::{RetryPolicy, Transport};

/// HTTP client bound to a configuration handle and one connection pool.
///
/// Base URL, default headers and retry policy are fixed when the client is
/// built. The timeout default, log sanitizing and the configured token are
/// read from the current [`Config`] snapshot on every call, so
/// [`Config::update`] and file reloads reach an existing client.
///
/// `request` takes `&self`, so one client can serve concurrent calls from
/// several tasks. Changing the default headers requires `&mut self`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Config,
    base_url: String,
    transport: Transport,
    default_headers: HeaderMap,
}

impl ApiClient {
    /// Build a client from resolved settings, with a retry policy derived
    /// from `retry_count` and `retry_delay`.
    pub fn new(settings: Arc<Settings>) -> Result<Self> {
        Self::from_config(&Config::from_settings(Arc::unwrap_or_clone(settings)))
    }

    /// Build a client that follows `config`, including later updates.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings();
        let transport = Transport::new(RetryPolicy::from_settings(&settings), settings.timeout)?;
        Self::build(config.clone(), transport)
    }

    /// Build a client that resolves endpoints against `base_url` instead of
    /// the configured one.
    pub fn with_base_url(settings: Arc<Settings>, base_url: &str) -> Result<Self> {
        let mut client = Self::new(settings)?;
        client.base_url = base_url.trim_end_matches('/').to_string();
        Ok(client)
    }

    /// Build a client around an existing transport, e.g. with a custom policy.
    pub fn with_transport(settings: Arc<Settings>, transport: Transport) -> Result<Self> {
        Self::build(Config::from_settings(Arc::unwrap_or_clone(settings)), transport)
    }

    fn build(config: Config, transport: Transport) -> Result<Self> {
        let settings = config.settings();
        let mut default_headers = HeaderMap::new();
        for (name, value) in &settings.headers {
            let (name, value) = parse_header(name, value)?;
            default_headers.insert(name, value);
        }

        tracing::debug!(
            environment = %settings.environment,
            base_url = %settings.base_url,
            retries = transport.policy().total_retries,
            "API client initialized"
        );

        Ok(Self {
            base_url: settings.base_url.clone(),
            config,
            transport,
            default_headers,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<Settings> {
        self.config.settings()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Headers sent with every request unless a call overrides them.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Absolute URL for `endpoint`.
    pub fn url_for(&self, endpoint: &str) -> Result<Url> {
        build_url(&self.base_url, endpoint)
    }

    /// Send one request and buffer its response.
    ///
    /// Any status code, including 4xx and 5xx, is returned as a response.
    /// Only a failure to complete the exchange is an error.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let RequestOptions {
            headers: extra_headers,
            query,
            body,
            timeout,
        } = options;

        let mut url = self.url_for(endpoint)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        let mut headers = self.default_headers.clone();
        for (name, value) in &extra_headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        let payload = match &body {
            Some(RequestBody::Json(value)) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(serde_json::to_vec(value)?)
            }
            Some(RequestBody::Raw(bytes)) => Some(bytes.clone()),
            None => None,
        };

        let settings = self.config.settings();
        let request_id = Uuid::new_v4();
        let record = RequestRecord::new(method.clone(), url.clone(), &headers, body);
        log_request(&record, request_id, settings.log_sanitize);

        let mut request = Request::new(method.clone(), url.clone());
        *request.headers_mut() = headers;
        *request.timeout_mut() = Some(timeout.unwrap_or(settings.timeout));
        if let Some(payload) = payload {
            *request.body_mut() = Some(payload.into());
        }

        let started = Instant::now();
        let delivered = match self.transport.execute(request).await {
            Ok(delivered) => delivered,
            Err(e) => {
                log_transport_failure(&method, &url, request_id, &e);
                metrics::record_transport_failure(method.as_str());
                return Err(e.into());
            }
        };

        let attempts = delivered.attempts;
        let status = delivered.response.status();
        let response_headers = delivered.response.headers().clone();
        let bytes = match delivered.response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                log_transport_failure(&method, &url, request_id, &e);
                metrics::record_transport_failure(method.as_str());
                return Err(e.into());
            }
        };
        let elapsed = started.elapsed();

        let response = ApiResponse::from_exchange(
            method,
            url,
            status,
            response_headers,
            bytes.to_vec(),
            elapsed,
            request_id,
            attempts,
        );
        log_response(&response);
        metrics::record_request(
            response.method().as_str(),
            response.status(),
            elapsed,
            attempts,
        );

        Ok(response)
    }

    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse> {
        self.request(Method::GET, endpoint, RequestOptions::new()).await
    }

    /// GET with query parameters and/or extra headers.
    pub async fn get_with(&self, endpoint: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.request(Method::GET, endpoint, options).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<ApiResponse> {
        let options = RequestOptions::new().json(body)?;
        self.request(Method::POST, endpoint, options).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<ApiResponse> {
        let options = RequestOptions::new().json(body)?;
        self.request(Method::PUT, endpoint, options).await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<ApiResponse> {
        let options = RequestOptions::new().json(body)?;
        self.request(Method::PATCH, endpoint, options).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, endpoint, RequestOptions::new()).await
    }

    pub async fn head(&self, endpoint: &str) -> Result<ApiResponse> {
        self.request(Method::HEAD, endpoint, RequestOptions::new()).await
    }

    pub async fn options(&self, endpoint: &str) -> Result<ApiResponse> {
        self.request(Method::OPTIONS, endpoint, RequestOptions::new()).await
    }

    /// Set `Authorization: <scheme> <token>` on every subsequent request.
    pub fn set_auth_token(&mut self, token: &str, scheme: &str) -> Result<()> {
        self.set_authorization(format!("{scheme} {token}"))?;
        tracing::info!(scheme = %scheme, "Authentication token set");
        Ok(())
    }

    pub fn set_bearer_token(&mut self, token: &str) -> Result<()> {
        self.set_auth_token(token, "Bearer")
    }

    /// Set HTTP Basic credentials on every subsequent request.
    pub fn set_basic_auth(&mut self, username: &str, password: &str) -> Result<()> {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        self.set_authorization(format!("Basic {encoded}"))?;
        tracing::info!(username = %username, "Basic authentication set");
        Ok(())
    }

    /// Apply the configured `auth_token` as a bearer token.
    ///
    /// Returns `false` when no token is configured.
    pub fn apply_configured_token(&mut self) -> Result<bool> {
        let Some(token) = self.config.settings().auth_token.clone() else {
            return Ok(false);
        };
        self.set_bearer_token(&token)?;
        Ok(true)
    }

    /// Add or replace a persistent default header.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        let (header, value) = parse_header(name, value)?;
        self.default_headers.insert(header, value);
        tracing::debug!(header = %name, "Default header set");
        Ok(())
    }

    /// Remove a persistent default header. Returns whether it was present.
    pub fn remove_header(&mut self, name: &str) -> bool {
        let removed = self.default_headers.remove(name).is_some();
        if removed {
            tracing::debug!(header = %name, "Default header removed");
        }
        removed
    }

    /// Release the connection pool.
    pub fn close(self) {
        tracing::info!(base_url = %self.base_url, "API client closed");
    }

    fn set_authorization(&mut self, value: String) -> Result<()> {
        let mut value = HeaderValue::from_str(&value).map_err(|e| Error::InvalidHeader {
            name: AUTHORIZATION.to_string(),
            reason: e.to_string(),
        })?;
        value.set_sensitive(true);
        self.default_headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok((header, value))
}
