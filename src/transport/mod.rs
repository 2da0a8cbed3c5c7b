//! Session/transport subsystem.
//!
//! # Data Flow
//! ```text
//! ApiClient builds reqwest::Request
//!     → session.rs (send over pooled client)
//!     → retryable status / connection error?
//!         → retries.rs (method allowed? budget left? delay)
//!         → backoff.rs (factor × 2^(n-1), capped)
//!         → re-send cloned request
//!     → Delivered { response, attempts } | TransportError
//! ```
//!
//! # Design Decisions
//! - Retries are invisible to the caller except as latency or a final error
//! - 4xx/5xx outside the retry list are data, not errors
//! - Per-request timeout travels with the request and survives cloning

pub mod backoff;
pub mod retries;
pub mod session;

pub use retries::{RetryPolicy, RETRYABLE_STATUS_CODES};
pub use session::{Delivered, Transport, TransportError};
