//! # Error Handling
//!
//! Errors raised while reading, averaging, exporting and loading price data.
//!
//! ## Overview
//!
//! Every component reports failures through [`PipelineError`]. Errors travel
//! in-band on component streams (`Result<T, PipelineError>` items) so a
//! consumer sees the first failure in arrival order and stops there.
//!
//! There is no skip or retry policy: a malformed record invalidates the whole
//! pass and the caller re-runs from the dataset. At the top level,
//! [`PipelineFailure`] tags the error with the [`PipelineStage`] it came from.
//!
//! ## Example
//!
//! ```rust
//! use price_averages::error::{PipelineError, PipelineFailure, PipelineStage};
//!
//! let error = PipelineError::MalformedRecord {
//!   line: 3,
//!   column: "MSRP".to_string(),
//!   value: "n/a".to_string(),
//! };
//! let failure = PipelineFailure::new(PipelineStage::Aggregate, error);
//! assert_eq!(failure.stage, PipelineStage::Aggregate);
//! ```

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error type shared by every pipeline component.
#[derive(Error, Debug)]
pub enum PipelineError {
  /// A numeric field could not be parsed, or parsed to a non-finite value.
  #[error("malformed record at line {line}: column `{column}` has non-numeric value `{value}`")]
  MalformedRecord {
    /// 1-based line number in the source file (header is line 1).
    line: u64,
    /// Name of the offending column.
    column: String,
    /// Raw field text.
    value: String,
  },
  /// The header row lacks a column the source was configured to read.
  #[error("column `{column}` not found in header of {}", path.display())]
  MissingColumn {
    /// Name of the missing column.
    column: String,
    /// File whose header was inspected.
    path: PathBuf,
  },
  /// The dataset file does not exist.
  #[error("source not found: {}", path.display())]
  SourceNotFound {
    /// The path that was looked up.
    path: PathBuf,
  },
  /// The pass required at least one record and received none.
  #[error("record stream was empty")]
  EmptyStream,
  /// Transfer into the bulk store failed.
  #[error("upload of {} to {remote} failed: {reason}", local.display())]
  Upload {
    /// Local file being uploaded.
    local: PathBuf,
    /// Target path inside the bulk store.
    remote: String,
    /// What went wrong.
    reason: String,
  },
  /// A bulk store file could not be inspected, read or removed.
  #[error("bulk store error at {path}: {reason}")]
  BulkStore {
    /// Path inside the bulk store.
    path: String,
    /// What went wrong.
    reason: String,
  },
  /// The query store rejected a statement or the connection is unusable.
  #[error("query store error: {0}")]
  QueryStore(String),
  /// Configuration could not be loaded.
  #[error("configuration error: {0}")]
  Config(String),
  /// CSV reading or writing failed.
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),
  /// I/O error.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Represents the stage in a pipeline where an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
  /// Reading and folding the dataset.
  Aggregate,
  /// Writing the export file.
  Export,
  /// Uploading the export into the bulk store.
  Upload,
  /// Dropping, creating and loading the query-store table.
  Load,
  /// Reading back the extremal averages.
  Analysis,
}

impl fmt::Display for PipelineStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      PipelineStage::Aggregate => "aggregate",
      PipelineStage::Export => "export",
      PipelineStage::Upload => "upload",
      PipelineStage::Load => "load",
      PipelineStage::Analysis => "analysis",
    };
    f.write_str(name)
  }
}

/// Information about a pipeline component.
///
/// Used as the `component` field of log events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
  /// The name of the component.
  pub name: String,
  /// The type name of the component.
  pub type_name: String,
}

impl ComponentInfo {
  /// Creates a new `ComponentInfo` with the given name and type name.
  pub fn new(name: String, type_name: String) -> Self {
    Self { name, type_name }
  }
}

impl fmt::Display for ComponentInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.name, self.type_name)
  }
}

/// An error that stopped a pipeline run, tagged with its stage.
#[derive(Error, Debug)]
#[error("pipeline failed during {stage}: {source}")]
pub struct PipelineFailure {
  /// The stage that failed.
  pub stage: PipelineStage,
  /// The underlying error.
  #[source]
  pub source: PipelineError,
}

impl PipelineFailure {
  /// Wraps `source` with the stage it occurred in.
  pub fn new(stage: PipelineStage, source: PipelineError) -> Self {
    Self { stage, source }
  }
}

/// Extension for tagging a `Result` with the stage that produced it.
pub trait StageContext<T> {
  /// Maps the error into a [`PipelineFailure`] for `stage`.
  fn stage(self, stage: PipelineStage) -> std::result::Result<T, PipelineFailure>;
}

impl<T> StageContext<T> for Result<T> {
  fn stage(self, stage: PipelineStage) -> std::result::Result<T, PipelineFailure> {
    self.map_err(|source| PipelineFailure::new(stage, source))
  }
}
