//! Crate-level error type.
//!
//! HTTP error statuses are not represented here: a 404 or 500 is an ordinary
//! [`ApiResponse`](crate::client::ApiResponse) for the assertion layer to
//! judge. Only failures to complete an exchange, and failed assertions, are
//! errors.

use thiserror::Error;

use crate::assertions::AssertionFailure;
use crate::data::DataError;
use crate::transport::TransportError;

/// Errors surfaced by the client, assertions and data providers.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure after retries were exhausted, passed through unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(TransportError::Request(e))
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
