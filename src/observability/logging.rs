//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for a test run
//! - Console output (human-readable or JSON)
//! - Optional log directory split by severity plus a request/response event file
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` overrides the configured console level
//! - Files are opened in append mode; rotation is left to the environment

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::{filter_fn, LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::observability::exchange::EXCHANGE_TARGET;

/// All events at debug and above from this crate.
pub const MAIN_LOG_FILE: &str = "api_tests.log";

/// Error events only.
pub const ERROR_LOG_FILE: &str = "errors.log";

/// Request/response events, one JSON object per line.
pub const EXCHANGE_LOG_FILE: &str = "api_requests.jsonl";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    Filter(String),

    #[error("Cannot open log file {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Logging already initialized: {0}")]
    Init(String),
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Console filter directive (e.g. "info", "api_testkit=debug").
    pub level: String,

    /// Emit console events as JSON instead of compact text.
    pub json_console: bool,

    /// Directory for the log files; `None` logs to the console only.
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_console: false,
            log_dir: None,
        }
    }
}

impl LogConfig {
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber.
///
/// Returns `LoggingError::Init` when a subscriber is already installed,
/// which test binaries calling this from several tests can ignore.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let layers = build_layers(config)?;
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}

fn build_layers(config: &LogConfig) -> Result<Vec<BoxedLayer>, LoggingError> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggingError::Filter(e.to_string()))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console = if config.json_console {
        fmt::layer()
            .json()
            .with_target(true)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(true)
            .with_filter(console_filter)
            .boxed()
    };
    layers.push(console);

    if let Some(dir) = &config.log_dir {
        fs::create_dir_all(dir).map_err(|source| LoggingError::File {
            path: dir.clone(),
            source,
        })?;

        let main = open_append(&dir.join(MAIN_LOG_FILE))?;
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(main))
                .with_filter(
                    Targets::new()
                        .with_target("api_testkit", Level::DEBUG)
                        .with_default(Level::INFO),
                )
                .boxed(),
        );

        let errors = open_append(&dir.join(ERROR_LOG_FILE))?;
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(errors))
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );

        let exchanges = open_append(&dir.join(EXCHANGE_LOG_FILE))?;
        layers.push(
            fmt::layer()
                .json()
                .with_writer(Mutex::new(exchanges))
                .with_filter(filter_fn(|meta| meta.target() == EXCHANGE_TARGET))
                .boxed(),
        );
    }

    Ok(layers)
}

fn open_append(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::File {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_only_has_one_layer() {
        let layers = build_layers(&LogConfig::default()).unwrap();
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn test_log_dir_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::default().with_log_dir(dir.path().join("logs"));
        let layers = build_layers(&config).unwrap();

        assert_eq!(layers.len(), 4);
        for name in [MAIN_LOG_FILE, ERROR_LOG_FILE, EXCHANGE_LOG_FILE] {
            assert!(dir.path().join("logs").join(name).exists());
        }
    }

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LogConfig {
            level: "api_testkit=notalevel".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(build_layers(&config), Err(LoggingError::Filter(_))));
    }
}
