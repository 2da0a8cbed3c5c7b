//! Assertion layer.
//!
//! # Data Flow
//! ```text
//! &ApiResponse + expectation
//!     → checks.rs / payload.rs (compare; JSON bodies via path.rs)
//!     → pass: info log, metric
//!     → fail: error log with context, metric, Err(AssertionFailure)
//! ```
//!
//! # Design Decisions
//! - Stateless free functions; nothing is cached between checks
//! - A missing path or malformed path expression is a failure, never a panic
//! - Failure context always carries url, method and a truncated body

pub mod checks;
pub mod failure;
pub mod path;
pub mod payload;

pub use checks::{
    assert_content_type, assert_elapsed, assert_header_exists, assert_header_value,
    assert_json_array_length, assert_json_contains, assert_json_key_exists,
    assert_json_key_value, assert_json_schema, assert_json_types, assert_response_time,
    assert_security_headers, assert_status_code, assert_status_code_in, assert_text_contains,
    CheckResult, JsonType, DEFAULT_SECURITY_HEADERS,
};
pub use failure::AssertionFailure;
pub use payload::{
    assert_api_rate_limit, assert_data_consistency, assert_date_format, assert_email_format,
    assert_json_structure, assert_pagination_data, assert_price_format, DateFormat, DateRule,
    Pagination, PriceRule, EMAIL_PATTERN,
};
pub use path::{JsonPath, PathError, Segment};
