//! Client that remembers the last response.
//!
//! Mirrors a stateful test-session style: each call replaces the stored
//! response, and the accessors read from it. Methods take `&mut self`, so a
//! `RecordingClient` is owned by one test at a time.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::client::dispatcher::ApiClient;
use crate::client::request::RequestOptions;
use crate::client::response::ApiResponse;
use crate::error::Result;

#[derive(Debug)]
pub struct RecordingClient {
    client: ApiClient,
    last: Option<ApiResponse>,
    last_elapsed: Option<Duration>,
}

impl RecordingClient {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            last: None,
            last_elapsed: None,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Mutable access, e.g. to set auth headers.
    pub fn client_mut(&mut self) -> &mut ApiClient {
        &mut self.client
    }

    pub fn into_inner(self) -> ApiClient {
        self.client
    }

    /// Send a request and store its response.
    ///
    /// A failed call clears the stored response but still records how long
    /// it took in [`response_time`](Self::response_time).
    pub async fn request(
        &mut self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<&ApiResponse> {
        self.last = None;
        let started = Instant::now();
        let result = self.client.request(method, endpoint, options).await;
        match result {
            Ok(response) => {
                self.last_elapsed = Some(response.elapsed());
                let stored: &ApiResponse = self.last.insert(response);
                Ok(stored)
            }
            Err(e) => {
                self.last_elapsed = Some(started.elapsed());
                Err(e)
            }
        }
    }

    pub async fn get(&mut self, endpoint: &str) -> Result<&ApiResponse> {
        self.request(Method::GET, endpoint, RequestOptions::new()).await
    }

    pub async fn post<T: Serialize + ?Sized>(&mut self, endpoint: &str, body: &T) -> Result<&ApiResponse> {
        let options = RequestOptions::new().json(body)?;
        self.request(Method::POST, endpoint, options).await
    }

    pub async fn put<T: Serialize + ?Sized>(&mut self, endpoint: &str, body: &T) -> Result<&ApiResponse> {
        let options = RequestOptions::new().json(body)?;
        self.request(Method::PUT, endpoint, options).await
    }

    pub async fn patch<T: Serialize + ?Sized>(&mut self, endpoint: &str, body: &T) -> Result<&ApiResponse> {
        let options = RequestOptions::new().json(body)?;
        self.request(Method::PATCH, endpoint, options).await
    }

    pub async fn delete(&mut self, endpoint: &str) -> Result<&ApiResponse> {
        self.request(Method::DELETE, endpoint, RequestOptions::new()).await
    }

    pub async fn head(&mut self, endpoint: &str) -> Result<&ApiResponse> {
        self.request(Method::HEAD, endpoint, RequestOptions::new()).await
    }

    pub async fn options(&mut self, endpoint: &str) -> Result<&ApiResponse> {
        self.request(Method::OPTIONS, endpoint, RequestOptions::new()).await
    }

    pub fn last_response(&self) -> Option<&ApiResponse> {
        self.last.as_ref()
    }

    /// Duration of the last call, whether or not it produced a response.
    pub fn response_time(&self) -> Option<Duration> {
        self.last_elapsed
    }

    /// Body of the last response as JSON; `None` if absent or not JSON.
    pub fn response_json(&self) -> Option<Value> {
        self.last.as_ref().and_then(|r| r.json().ok())
    }

    pub fn response_text(&self) -> Option<Cow<'_, str>> {
        self.last.as_ref().map(ApiResponse::text)
    }

    pub fn response_headers(&self) -> Option<&HeaderMap> {
        self.last.as_ref().map(ApiResponse::headers)
    }

    pub fn status_code(&self) -> Option<u16> {
        self.last.as_ref().map(ApiResponse::status)
    }

    pub fn close(self) {
        self.client.close();
    }
}
