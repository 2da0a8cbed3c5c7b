//! Shared configuration handle.
//!
//! `Config` owns the current `Arc<Settings>` behind an `ArcSwap`. Readers take
//! a snapshot with [`Config::settings`]; writers never mutate a snapshot but
//! build a new one and swap it in, so requests already holding the old
//! snapshot are unaffected.
//!
//! Clones share the same cell. A client built from a `Config` therefore sees
//! every later `update` or file reload on its next request.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::config::loader::{
    environment_name, load_settings, secret_overrides, ConfigError, EnvLookup, ProcessEnv,
    DEFAULT_CONFIG_PATH,
};
use crate::config::schema::{SecretOverrides, Settings};

/// Resolved configuration for one environment.
#[derive(Debug, Clone)]
pub struct Config {
    environment: String,
    overrides: SecretOverrides,
    current: Arc<ArcSwap<Settings>>,
}

impl Config {
    /// Load `config/environments.json` for `environment` using the process
    /// environment for `ENVIRONMENT`, `AUTH_TOKEN` and `DATABASE_URL`.
    pub fn load(environment: Option<&str>) -> Self {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH), environment, &ProcessEnv)
    }

    /// Load from an explicit file and environment source.
    ///
    /// Never fails: missing or invalid files degrade to the built-in defaults.
    pub fn load_from(path: &Path, environment: Option<&str>, env: &impl EnvLookup) -> Self {
        let environment = environment_name(environment, env);
        let overrides = secret_overrides(env);
        let settings = load_settings(path, &environment, &overrides);
        Self {
            environment,
            overrides,
            current: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// Wrap already-resolved settings.
    ///
    /// Their secrets stay in the snapshot and survive later updates.
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            environment: settings.environment.clone(),
            overrides: SecretOverrides::default(),
            current: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Secret overrides captured from the environment at load time.
    pub fn overrides(&self) -> &SecretOverrides {
        &self.overrides
    }

    /// Value for `key` in the current snapshot.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.current.load().get(key)
    }

    /// Value for `key`, or `default` when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Set `key` to `value` and publish a new snapshot.
    ///
    /// The new snapshot is re-derived and validated from the current one with
    /// `key` replaced; on failure the current snapshot is kept and the error
    /// returned.
    pub fn update(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let current = self.current.load_full();
        let mut raw = current.to_map();
        raw.insert(key.to_string(), value.clone());

        let next = Settings::from_section(&self.environment, raw, &self.overrides)?;
        self.current.store(Arc::new(next));
        tracing::info!(key = %key, value = %value, "Updated config");
        Ok(())
    }

    /// Publish a fully-built snapshot (used by the file watcher).
    pub fn replace(&self, settings: Settings) {
        self.current.store(Arc::new(settings));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_absent_file_gives_default_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("missing.json"), Some("dev"), &HashMap::new());
        assert_eq!(
            config.settings().base_url,
            "https://jsonplaceholder.typicode.com"
        );
        assert_eq!(config.environment(), "dev");
    }

    #[test]
    fn test_env_secrets_applied_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let env = HashMap::from([
            ("AUTH_TOKEN".to_string(), "secret".to_string()),
            ("ENVIRONMENT".to_string(), "staging".to_string()),
        ]);
        let config = Config::load_from(&dir.path().join("missing.json"), None, &env);
        assert_eq!(config.environment(), "staging");
        assert_eq!(config.settings().auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_update_publishes_new_snapshot() {
        let config = Config::from_settings(Settings::default());
        let before = config.settings();

        config.update("timeout", json!(5)).unwrap();

        assert_eq!(before.timeout, Duration::from_secs(30));
        assert_eq!(config.settings().timeout, Duration::from_secs(5));
        assert_eq!(config.get("timeout"), Some(json!(5)));
    }

    #[test]
    fn test_update_keeps_custom_keys() {
        let config = Config::from_settings(Settings::default());
        config.update("suite", json!("regression")).unwrap();
        assert_eq!(config.get_or("suite", json!(null)), json!("regression"));
        assert_eq!(config.get_or("missing", json!(42)), json!(42));
    }

    #[test]
    fn test_unrelated_update_keeps_typed_fields() {
        let mut settings = Settings::default();
        settings.timeout = Duration::from_secs(5);
        settings.auth_token = Some("tok".to_string());
        settings.database_url = Some("sqlite://mem".to_string());
        let config = Config::from_settings(settings);

        config.update("suite", json!("x")).unwrap();

        let current = config.settings();
        assert_eq!(current.timeout, Duration::from_secs(5));
        assert_eq!(current.auth_token.as_deref(), Some("tok"));
        assert_eq!(current.database_url.as_deref(), Some("sqlite://mem"));
        assert_eq!(config.get("timeout"), Some(json!(5)));
    }

    #[test]
    fn test_env_token_survives_update() {
        let dir = tempfile::tempdir().unwrap();
        let env = HashMap::from([("AUTH_TOKEN".to_string(), "secret".to_string())]);
        let config = Config::load_from(&dir.path().join("missing.json"), Some("dev"), &env);

        config.update("retry_count", json!(0)).unwrap();

        assert_eq!(config.settings().retry_count, 0);
        assert_eq!(config.settings().auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_clones_share_updates() {
        let config = Config::from_settings(Settings::default());
        let handle = config.clone();
        config.update("timeout", json!(0.5)).unwrap();
        assert_eq!(handle.settings().timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_update_keeps_current() {
        let config = Config::from_settings(Settings::default());
        let err = config.update("base_url", json!("not a url")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert_eq!(config.settings().base_url, "https://jsonplaceholder.typicode.com");
    }
}
