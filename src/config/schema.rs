//! Configuration schema definitions.
//!
//! An environments file holds one section per environment name. Each section
//! is kept as a raw JSON map (for dynamic `get`) and converted into the typed,
//! immutable [`Settings`] the client consumes.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::loader::ConfigError;
use crate::config::validation::{validate_settings, ValidationError};

/// Base URL used when no configuration file is available.
pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Environment selected when neither the caller nor `ENVIRONMENT` names one.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// One environment section as it appears in the file.
///
/// Durations are expressed in seconds and may be fractional.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentSection {
    /// Origin + path prefix all relative endpoints are joined onto.
    pub base_url: String,

    /// Default request timeout in seconds.
    pub timeout: f64,

    /// Number of transport-level retries after the first attempt.
    pub retry_count: u32,

    /// Backoff factor in seconds.
    pub retry_delay: f64,

    /// Default headers sent with every request.
    pub headers: BTreeMap<String, String>,

    /// Authentication token (overridden by `AUTH_TOKEN`).
    pub auth_token: Option<String>,

    /// Database URL (overridden by `DATABASE_URL`).
    pub database_url: Option<String>,

    /// Redact sensitive headers and body keys in request logs.
    pub log_sanitize: bool,
}

impl Default for EnvironmentSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: 30.0,
            retry_count: 3,
            retry_delay: 1.0,
            headers: default_headers(),
            auth_token: None,
            database_url: None,
            log_sanitize: true,
        }
    }
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
    ])
}

/// Secret values resolved from the process environment.
///
/// When present they take precedence over the file values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretOverrides {
    pub auth_token: Option<String>,
    pub database_url: Option<String>,
}

/// Keys backed by a typed [`Settings`] field.
const TYPED_KEYS: [&str; 8] = [
    "base_url",
    "timeout",
    "retry_count",
    "retry_delay",
    "headers",
    "auth_token",
    "database_url",
    "log_sanitize",
];

/// Resolved client settings.
///
/// The typed fields are authoritative. Keys the schema does not know about
/// are kept in `extra`, and [`Settings::to_map`] renders both as one section,
/// so a value read with `get` always matches the field the client uses.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Name of the environment these settings were resolved for.
    pub environment: String,

    /// Base URL without a trailing slash.
    pub base_url: String,

    pub timeout: Duration,

    pub retry_count: u32,

    /// Backoff factor for the transport retry policy.
    pub retry_delay: Duration,

    pub headers: BTreeMap<String, String>,

    pub auth_token: Option<String>,

    pub database_url: Option<String>,

    pub log_sanitize: bool,

    extra: Map<String, Value>,
}

impl Settings {
    /// Build settings from a raw section, applying secret overrides and
    /// semantic validation.
    pub fn from_section(
        environment: &str,
        raw: Map<String, Value>,
        overrides: &SecretOverrides,
    ) -> Result<Self, ConfigError> {
        let section: EnvironmentSection = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| ConfigError::Value(e.to_string()))?;

        let mut errors = Vec::new();
        let timeout = seconds("timeout", section.timeout, &mut errors);
        let retry_delay = seconds("retry_delay", section.retry_delay, &mut errors);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        let extra = raw
            .into_iter()
            .filter(|(key, _)| !TYPED_KEYS.contains(&key.as_str()))
            .collect();

        let settings = Self {
            environment: environment.to_string(),
            base_url: section.base_url.trim_end_matches('/').to_string(),
            timeout,
            retry_count: section.retry_count,
            retry_delay,
            headers: section.headers,
            auth_token: overrides.auth_token.clone().or(section.auth_token),
            database_url: overrides.database_url.clone().or(section.database_url),
            log_sanitize: section.log_sanitize,
            extra,
        };

        validate_settings(&settings).map_err(ConfigError::Validation)?;
        Ok(settings)
    }

    /// Built-in defaults for `environment`, with secret overrides applied.
    pub fn defaults(environment: &str, overrides: &SecretOverrides) -> Self {
        let section = EnvironmentSection::default();
        Self {
            environment: environment.to_string(),
            base_url: section.base_url,
            timeout: Duration::from_secs(30),
            retry_count: section.retry_count,
            retry_delay: Duration::from_secs(1),
            headers: section.headers,
            auth_token: overrides.auth_token.clone(),
            database_url: overrides.database_url.clone(),
            log_sanitize: section.log_sanitize,
            extra: Map::new(),
        }
    }

    /// The full section these settings represent, typed fields included.
    ///
    /// Durations are rendered in seconds; absent secrets are omitted.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        for key in TYPED_KEYS {
            if let Some(value) = self.typed_value(key) {
                map.insert(key.to_string(), value);
            }
        }
        map
    }

    /// Look up a configuration value by key.
    pub fn get(&self, key: &str) -> Option<Value> {
        if TYPED_KEYS.contains(&key) {
            self.typed_value(key)
        } else {
            self.extra.get(key).cloned()
        }
    }

    /// Returns a copy of these settings pointing at another base URL.
    pub fn with_base_url(&self, base_url: &str) -> Self {
        let mut next = self.clone();
        next.base_url = base_url.trim_end_matches('/').to_string();
        next
    }

    fn typed_value(&self, key: &str) -> Option<Value> {
        let value = match key {
            "base_url" => json!(self.base_url),
            "timeout" => seconds_value(self.timeout),
            "retry_count" => json!(self.retry_count),
            "retry_delay" => seconds_value(self.retry_delay),
            "headers" => json!(self.headers),
            "auth_token" => json!(self.auth_token.as_ref()?),
            "database_url" => json!(self.database_url.as_ref()?),
            "log_sanitize" => json!(self.log_sanitize),
            _ => return None,
        };
        Some(value)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults(DEFAULT_ENVIRONMENT, &SecretOverrides::default())
    }
}

fn seconds_value(duration: Duration) -> Value {
    if duration.subsec_nanos() == 0 {
        json!(duration.as_secs())
    } else {
        json!(duration.as_secs_f64())
    }
}

fn seconds(field: &'static str, value: f64, errors: &mut Vec<ValidationError>) -> Duration {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) => duration,
        Err(_) => {
            errors.push(ValidationError::InvalidDuration { field, value });
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_default_section() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.retry_count, 3);
        assert_eq!(settings.retry_delay, Duration::from_secs(1));
        assert_eq!(settings.headers["Accept"], "application/json");
        assert_eq!(settings.get("timeout"), Some(json!(30)));
    }

    #[test]
    fn test_section_strips_trailing_slash() {
        let raw = json!({ "base_url": "https://api.example.com/v1/" });
        let Value::Object(raw) = raw else { unreachable!() };
        let settings = Settings::from_section("qa", raw, &SecretOverrides::default()).unwrap();
        assert_eq!(settings.base_url, "https://api.example.com/v1");
        // Keys absent from the section take their defaults.
        assert_eq!(settings.retry_count, 3);
    }

    #[test]
    fn test_fractional_seconds() {
        let Value::Object(raw) = json!({ "timeout": 2.5, "retry_delay": 0.25 }) else {
            unreachable!()
        };
        let settings = Settings::from_section("dev", raw, &SecretOverrides::default()).unwrap();
        assert_eq!(settings.timeout, Duration::from_millis(2500));
        assert_eq!(settings.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let Value::Object(raw) = json!({ "retry_delay": -1 }) else { unreachable!() };
        let err = Settings::from_section("dev", raw, &SecretOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
    }

    #[test]
    fn test_secret_overrides_win() {
        let Value::Object(raw) = json!({ "auth_token": "from-file", "database_url": "sqlite://file" })
        else {
            unreachable!()
        };
        let overrides = SecretOverrides {
            auth_token: Some("from-env".to_string()),
            database_url: None,
        };
        let settings = Settings::from_section("dev", raw, &overrides).unwrap();
        assert_eq!(settings.auth_token.as_deref(), Some("from-env"));
        assert_eq!(settings.database_url.as_deref(), Some("sqlite://file"));
    }

    #[test]
    fn test_with_base_url_is_visible_through_get() {
        let settings = Settings::default().with_base_url("https://reqres.in/api/");
        assert_eq!(settings.base_url, "https://reqres.in/api");
        assert_eq!(settings.get("base_url"), Some(json!("https://reqres.in/api")));
    }

    #[test]
    fn test_map_follows_typed_fields() {
        let mut settings = Settings::default();
        settings.timeout = Duration::from_millis(1500);
        settings.auth_token = Some("tok".to_string());

        assert_eq!(settings.get("timeout"), Some(json!(1.5)));
        assert_eq!(settings.get("auth_token"), Some(json!("tok")));
        assert_eq!(settings.get("database_url"), None);

        let map = settings.to_map();
        assert_eq!(map["retry_count"], json!(3));
        assert!(!map.contains_key("database_url"));
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let Value::Object(raw) = json!({ "suite": "smoke", "timeout": 10 }) else {
            unreachable!()
        };
        let settings = Settings::from_section("dev", raw, &SecretOverrides::default()).unwrap();
        assert_eq!(settings.get("suite"), Some(json!("smoke")));
        assert_eq!(settings.get("timeout"), Some(json!(10)));
        assert_eq!(settings.to_map()["suite"], json!("smoke"));
    }
}
