//! Endpoint → absolute URL resolution.

use url::Url;

use crate::error::{Error, Result};

/// True when `endpoint` carries its own `http://` or `https://` scheme.
pub fn is_absolute(endpoint: &str) -> bool {
    let lower = endpoint.get(..8).unwrap_or(endpoint).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Join `endpoint` onto `base_url`.
///
/// Absolute endpoints are used verbatim. Relative ones are joined with
/// exactly one `/` between base and endpoint.
pub fn build_url(base_url: &str, endpoint: &str) -> Result<Url> {
    let joined = if is_absolute(endpoint) {
        endpoint.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    };

    Url::parse(&joined).map_err(|e| Error::InvalidUrl {
        url: joined,
        reason: e.to_string(),
    })
}
