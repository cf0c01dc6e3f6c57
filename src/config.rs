//! Pipeline configuration.
//!
//! All file paths, column names and service coordinates live in
//! [`PipelineConfig`] and are handed to each collaborator when it is built.
//! Every field has a default, so a JSON file only needs the keys it changes:
//!
//! ```json
//! {
//!   "source": { "path": "cars.csv" },
//!   "query_store": { "table": "msrp_by_make" }
//! }
//! ```

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where and how to read the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
  /// Path to the dataset CSV.
  pub path: PathBuf,
  /// Header name of the category column.
  pub key_column: String,
  /// Header name of the numeric column.
  pub value_column: String,
  /// Field delimiter.
  pub delimiter: u8,
  /// Whether to trim whitespace around fields.
  pub trim: bool,
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      path: PathBuf::from("data.csv"),
      key_column: "Make".to_string(),
      value_column: "MSRP".to_string(),
      delimiter: b',',
      trim: true,
    }
  }
}

/// Where to write the exported averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
  /// Output CSV path. Overwritten on every run.
  pub path: PathBuf,
  /// Header row written before the data rows.
  pub header: [String; 2],
}

impl Default for SinkConfig {
  fn default() -> Self {
    Self {
      path: PathBuf::from("transformed-data.csv"),
      header: ["key".to_string(), "mean".to_string()],
    }
  }
}

/// Bulk store location and upload target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkStoreConfig {
  /// Local directory backing the store namespace.
  pub root: PathBuf,
  /// Absolute path of the uploaded file inside the store.
  pub remote_path: String,
  /// Replace an existing file at `remote_path`.
  pub overwrite: bool,
}

impl Default for BulkStoreConfig {
  fn default() -> Self {
    Self {
      root: PathBuf::from("hdfs"),
      remote_path: "/user/student/transformed-data.csv".to_string(),
      overwrite: true,
    }
  }
}

/// Query store connection and table layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryStoreConfig {
  /// Service host.
  pub host: String,
  /// Service port.
  pub port: u16,
  /// Database name.
  pub database: String,
  /// Table holding the averages.
  pub table: String,
  /// Name of the string column.
  pub key_column: String,
  /// Name of the float column.
  pub value_column: String,
}

impl Default for QueryStoreConfig {
  fn default() -> Self {
    Self {
      host: "localhost".to_string(),
      port: 10000,
      database: "default".to_string(),
      table: "car_prices".to_string(),
      key_column: "key".to_string(),
      value_column: "value".to_string(),
    }
  }
}

impl QueryStoreConfig {
  /// `host:port/database`, used in log events.
  pub fn address(&self) -> String {
    format!("{}:{}/{}", self.host, self.port, self.database)
  }
}

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Dataset settings.
  pub source: SourceConfig,
  /// Export settings.
  pub sink: SinkConfig,
  /// Bulk store settings.
  pub bulk_store: BulkStoreConfig,
  /// Query store settings.
  pub query_store: QueryStoreConfig,
  /// Fail the run when the dataset has no data rows.
  pub require_records: bool,
}

impl PipelineConfig {
  /// Loads a configuration from a JSON file.
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
      .map_err(|e| PipelineError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    Self::from_json_str(&text)
  }

  /// Parses a configuration from JSON text.
  pub fn from_json_str(text: &str) -> Result<Self> {
    serde_json::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))
  }

  /// Sets the dataset path.
  #[must_use]
  pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.source.path = path.into();
    self
  }

  /// Sets the export path.
  #[must_use]
  pub fn with_sink_path(mut self, path: impl Into<PathBuf>) -> Self {
    self.sink.path = path.into();
    self
  }

  /// Sets the directory backing the bulk store.
  #[must_use]
  pub fn with_bulk_store_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.bulk_store.root = root.into();
    self
  }

  /// Sets the target path inside the bulk store.
  #[must_use]
  pub fn with_remote_path(mut self, remote_path: impl Into<String>) -> Self {
    self.bulk_store.remote_path = remote_path.into();
    self
  }

  /// Sets the query-store table name.
  #[must_use]
  pub fn with_table(mut self, table: impl Into<String>) -> Self {
    self.query_store.table = table.into();
    self
  }

  /// Sets whether an empty dataset is an error.
  #[must_use]
  pub fn with_require_records(mut self, require: bool) -> Self {
    self.require_records = require;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  #[test]
  fn test_defaults() {
    let config = PipelineConfig::default();

    assert_eq!(config.source.key_column, "Make");
    assert_eq!(config.source.value_column, "MSRP");
    assert_eq!(config.sink.header, ["key".to_string(), "mean".to_string()]);
    assert_eq!(config.query_store.address(), "localhost:10000/default");
    assert!(config.bulk_store.overwrite);
    assert!(!config.require_records);
  }

  #[test]
  fn test_partial_json_keeps_defaults() {
    let config = PipelineConfig::from_json_str(
      r#"{ "source": { "path": "cars.csv" }, "query_store": { "table": "t1" } }"#,
    )
    .unwrap();

    assert_eq!(config.source.path, PathBuf::from("cars.csv"));
    assert_eq!(config.source.key_column, "Make");
    assert_eq!(config.query_store.table, "t1");
    assert_eq!(config.query_store.port, 10000);
  }

  #[test]
  fn test_invalid_json_is_config_error() {
    let result = PipelineConfig::from_json_str("{ not json");
    assert!(matches!(result, Err(PipelineError::Config(_))));
  }

  #[test]
  fn test_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "require_records": true }}"#).unwrap();

    let config = PipelineConfig::from_json_file(file.path()).unwrap();
    assert!(config.require_records);
  }

  #[test]
  fn test_missing_file_is_config_error() {
    let result = PipelineConfig::from_json_file("/definitely/not/here.json");
    assert!(matches!(result, Err(PipelineError::Config(_))));
  }

  #[test]
  fn test_builder_chain() {
    let config = PipelineConfig::default()
      .with_source_path("in.csv")
      .with_sink_path("out.csv")
      .with_bulk_store_root("/tmp/store")
      .with_remote_path("/data/out.csv")
      .with_table("prices")
      .with_require_records(true);

    assert_eq!(config.source.path, PathBuf::from("in.csv"));
    assert_eq!(config.sink.path, PathBuf::from("out.csv"));
    assert_eq!(config.bulk_store.root, PathBuf::from("/tmp/store"));
    assert_eq!(config.bulk_store.remote_path, "/data/out.csv");
    assert_eq!(config.query_store.table, "prices");
    assert!(config.require_records);
  }
}
