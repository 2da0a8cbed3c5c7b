//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! ApiClient / assertions produce:
//!     → exchange.rs (request/response events, sanitized via sanitize.rs)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (console, severity-split files, JSON event file)
//!     → any `metrics` recorder installed by the test binary
//! ```
//!
//! # Design Decisions
//! - Structured fields, not formatted strings, for every exchange event
//! - Request ID flows from the request log line to the response and failures
//! - Sensitive headers and body keys are redacted unless disabled in settings

pub mod exchange;
pub mod logging;
pub mod metrics;
pub mod sanitize;

pub use logging::{init_logging, LogConfig, LoggingError};
