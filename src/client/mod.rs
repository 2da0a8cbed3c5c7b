//! Request dispatcher subsystem.
//!
//! # Responsibilities
//! - Turn (method, endpoint, options) into a logged, timed HTTP exchange
//! - Own persistent default headers (auth, custom headers)
//! - Hand back a buffered [`ApiResponse`] for the assertion layer

pub mod dispatcher;
pub mod recording;
pub mod request;
pub mod response;
pub mod url;

pub use dispatcher::ApiClient;
pub use recording::RecordingClient;
pub use request::{RequestBody, RequestOptions, RequestRecord};
pub use response::ApiResponse;
