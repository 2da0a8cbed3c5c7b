//! Test-data subsystem.

pub mod provider;

use std::path::PathBuf;

use thiserror::Error;

pub use provider::{expand_template, merge, validate_structure, CsvRow, DataProvider};

/// Errors raised while loading or saving fixtures.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Cannot access test data {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid CSV in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Unsupported test data format: {0}")]
    UnsupportedFormat(String),

    #[error("No test data found for test case '{0}'")]
    NotFound(String),

    #[error("Missing required keys in test data: {0:?}")]
    MissingKeys(Vec<String>),
}
