//! HTTP API test-automation toolkit.
//!
//! Resolves per-environment settings, sends requests through a pooled
//! transport with status-based retries, logs every exchange as structured
//! events, and judges responses with assertion helpers.
//!
//! ```rust,ignore
//! use api_testkit::{assertions::*, ApiClient, Config};
//!
//! let config = Config::load(Some("dev"));
//! let client = ApiClient::from_config(&config)?;
//! let response = client.get("/users/1").await?;
//! assert_status_code(&response, 200)?;
//! assert_json_key_value(&response, "address.city", &json!("Gwenborough"))?;
//! ```

pub mod assertions;
pub mod client;
pub mod config;
pub mod data;
pub mod error;
pub mod harness;
pub mod observability;
pub mod transport;

pub use assertions::AssertionFailure;
pub use client::{ApiClient, ApiResponse, RecordingClient, RequestOptions};
pub use config::{Config, Settings};
pub use data::DataProvider;
pub use error::{Error, Result};
pub use transport::{RetryPolicy, TransportError};
