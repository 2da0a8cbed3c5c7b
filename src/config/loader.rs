//! Configuration loading from disk and the process environment.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::{SecretOverrides, Settings, DEFAULT_ENVIRONMENT};
use crate::config::validation::ValidationError;

/// Default location of the environments file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/environments.json";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value: {0}")]
    Value(String),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Source of environment variables.
///
/// Lets tests resolve configuration without touching process-wide state.
pub trait EnvLookup {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads variables from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Pick the environment name: explicit argument, then `ENVIRONMENT`, then `dev`.
pub fn environment_name(requested: Option<&str>, env: &impl EnvLookup) -> String {
    requested
        .map(str::to_string)
        .or_else(|| env.var("ENVIRONMENT"))
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Resolve `AUTH_TOKEN` / `DATABASE_URL` from the environment.
pub fn secret_overrides(env: &impl EnvLookup) -> SecretOverrides {
    SecretOverrides {
        auth_token: env.var("AUTH_TOKEN"),
        database_url: env.var("DATABASE_URL"),
    }
}

/// Parse an environments file into its top-level map.
///
/// `.toml` files are parsed as TOML; everything else as JSON.
pub fn read_environments(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let value = if is_toml {
        let table: toml::Table = toml::from_str(&content)?;
        serde_json::to_value(table)?
    } else {
        serde_json::from_str(&content)?
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ConfigError::Value(format!(
            "expected a map of environments, found {}",
            type_name(&other)
        ))),
    }
}

/// Select the section for `environment`, falling back to `dev`, then to an
/// empty section (all defaults).
pub fn select_section(
    environments: &Map<String, Value>,
    environment: &str,
) -> Result<Map<String, Value>, ConfigError> {
    let section = match environments.get(environment) {
        Some(section) => section,
        None => match environments.get(DEFAULT_ENVIRONMENT) {
            Some(section) => {
                tracing::warn!(
                    environment = %environment,
                    fallback = DEFAULT_ENVIRONMENT,
                    "Environment not configured, using fallback section"
                );
                section
            }
            None => return Ok(Map::new()),
        },
    };

    match section {
        Value::Object(map) => Ok(map.clone()),
        other => Err(ConfigError::Value(format!(
            "environment '{}' must be a map, found {}",
            environment,
            type_name(other)
        ))),
    }
}

/// Load and validate settings, surfacing every failure.
pub fn try_load_settings(
    path: &Path,
    environment: &str,
    overrides: &SecretOverrides,
) -> Result<Settings, ConfigError> {
    let environments = read_environments(path)?;
    let section = select_section(&environments, environment)?;
    Settings::from_section(environment, section, overrides)
}

/// Load settings, degrading to the built-in defaults on any failure.
///
/// A missing file is logged as a warning; anything else as an error.
pub fn load_settings(path: &Path, environment: &str, overrides: &SecretOverrides) -> Settings {
    match try_load_settings(path, environment, overrides) {
        Ok(settings) => {
            tracing::info!(
                path = %path.display(),
                environment = %environment,
                base_url = %settings.base_url,
                "Configuration loaded"
            );
            settings
        }
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Settings::defaults(environment, overrides)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Invalid config file, using defaults");
            Settings::defaults(environment, overrides)
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
