//! Test-data fixtures on disk.
//!
//! # Responsibilities
//! - Load JSON, YAML and CSV fixtures from one data directory
//! - Build data-driven cases from templates and variations
//! - Save generated data back as JSON or CSV
//!
//! Every load failure is logged at `error` and returned; there is no silent
//! empty fallback.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::data::DataError;

/// One CSV row keyed by header.
pub type CsvRow = BTreeMap<String, String>;

/// Loads fixtures relative to a base directory.
#[derive(Debug, Clone)]
pub struct DataProvider {
    data_dir: PathBuf,
}

impl DataProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load a fixture, choosing the parser from its extension.
    ///
    /// CSV files come back as an array of objects with string values.
    pub fn load(&self, filename: &str) -> Result<Value, DataError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => self.load_json(filename),
            Some("yaml" | "yml") => self.load_yaml(filename),
            Some("csv") => {
                let rows = self.load_csv(filename)?;
                Ok(Value::Array(
                    rows.into_iter()
                        .map(|row| {
                            Value::Object(row.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
                        })
                        .collect(),
                ))
            }
            _ => {
                tracing::error!(file = %filename, "Unsupported test data format");
                Err(DataError::UnsupportedFormat(filename.to_string()))
            }
        }
    }

    pub fn load_json(&self, filename: &str) -> Result<Value, DataError> {
        let path = self.data_dir.join(filename);
        let text = read(&path)?;
        let value = serde_json::from_str(&text).map_err(|source| {
            tracing::error!(file = %path.display(), error = %source, "Invalid JSON test data");
            DataError::Json {
                path: path.clone(),
                source,
            }
        })?;
        tracing::info!(file = %filename, "Loaded JSON test data");
        Ok(value)
    }

    pub fn load_yaml(&self, filename: &str) -> Result<Value, DataError> {
        let path = self.data_dir.join(filename);
        let text = read(&path)?;
        let value = serde_yaml::from_str(&text).map_err(|source| {
            tracing::error!(file = %path.display(), error = %source, "Invalid YAML test data");
            DataError::Yaml {
                path: path.clone(),
                source,
            }
        })?;
        tracing::info!(file = %filename, "Loaded YAML test data");
        Ok(value)
    }

    /// Load a CSV file with a header row.
    pub fn load_csv(&self, filename: &str) -> Result<Vec<CsvRow>, DataError> {
        let path = self.data_dir.join(filename);
        let csv_error = |source: csv::Error| {
            tracing::error!(file = %path.display(), error = %source, "Invalid CSV test data");
            DataError::Csv {
                path: path.clone(),
                source,
            }
        };

        let mut reader = csv::Reader::from_path(&path).map_err(csv_error)?;
        let rows = reader
            .deserialize::<CsvRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_error)?;

        tracing::info!(file = %filename, rows = rows.len(), "Loaded CSV test data");
        Ok(rows)
    }

    /// Load `<name>.json`, falling back to `<name>.yaml`.
    pub fn load_test_case(&self, name: &str) -> Result<Value, DataError> {
        for filename in [format!("{name}.json"), format!("{name}.yaml")] {
            if self.data_dir.join(&filename).is_file() {
                return self.load(&filename);
            }
        }
        tracing::warn!(test_case = %name, "No test data found for test case");
        Err(DataError::NotFound(name.to_string()))
    }

    /// Write `data` as pretty JSON, creating the data directory if needed.
    pub fn save_json(&self, data: &Value, filename: &str) -> Result<PathBuf, DataError> {
        let path = self.data_dir.join(filename);
        let text = serde_json::to_string_pretty(data).map_err(|source| DataError::Json {
            path: path.clone(),
            source,
        })?;
        self.write(&path, text)?;
        tracing::info!(file = %filename, "Saved JSON test data");
        Ok(path)
    }

    /// Write rows as CSV with the first row's keys as the header.
    pub fn save_csv(&self, rows: &[CsvRow], filename: &str) -> Result<PathBuf, DataError> {
        let path = self.data_dir.join(filename);
        if rows.is_empty() {
            tracing::warn!(file = %filename, "No rows to save");
        }

        let csv_error = |source: csv::Error| DataError::Csv {
            path: path.clone(),
            source,
        };
        let header: Vec<&str> = rows
            .first()
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default();
        let mut writer = csv::Writer::from_writer(Vec::new());
        if !header.is_empty() {
            writer.write_record(&header).map_err(csv_error)?;
        }
        for row in rows {
            let record = header
                .iter()
                .map(|key| row.get(*key).map(String::as_str).unwrap_or_default());
            writer.write_record(record).map_err(csv_error)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv_error(csv::Error::from(e.into_error())))?;

        self.write(&path, bytes)?;
        tracing::info!(file = %filename, rows = rows.len(), "Saved CSV test data");
        Ok(path)
    }

    fn write(&self, path: &Path, contents: impl AsRef<[u8]>) -> Result<(), DataError> {
        fs::create_dir_all(&self.data_dir).map_err(|source| DataError::Io {
            path: self.data_dir.clone(),
            source,
        })?;
        fs::write(path, contents).map_err(|source| {
            tracing::error!(file = %path.display(), error = %source, "Cannot write test data");
            DataError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

/// Shallow-merge object sources; later sources win. Non-objects are skipped.
pub fn merge(sources: &[Value]) -> Map<String, Value> {
    let mut merged = Map::new();
    for source in sources.iter().filter_map(Value::as_object) {
        merged.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    tracing::debug!(sources = sources.len(), keys = merged.len(), "Merged test data");
    merged
}

/// One case per variation: the template with the variation's keys applied.
pub fn expand_template(template: &Map<String, Value>, variations: &[Map<String, Value>]) -> Vec<Map<String, Value>> {
    let cases: Vec<_> = variations
        .iter()
        .map(|variation| {
            let mut case = template.clone();
            case.extend(variation.iter().map(|(k, v)| (k.clone(), v.clone())));
            case
        })
        .collect();
    tracing::info!(cases = cases.len(), "Expanded test data template");
    cases
}

/// Check that every key in `required` is present in `data`.
pub fn validate_structure(data: &Map<String, Value>, required: &[&str]) -> Result<(), DataError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|key| !data.contains_key(**key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    tracing::error!(missing = ?missing, "Missing required keys in test data");
    Err(DataError::MissingKeys(missing))
}

fn read(path: &Path) -> Result<String, DataError> {
    fs::read_to_string(path).map_err(|source| {
        tracing::error!(file = %path.display(), error = %source, "Cannot read test data");
        DataError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}
