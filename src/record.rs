//! Data types flowing through the pipeline.

use serde::{Deserialize, Serialize};

/// One observation: a category key and a numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  /// Category the value belongs to.
  pub key: String,
  /// Observed value.
  pub value: f64,
}

impl Record {
  /// Creates a new record.
  pub fn new(key: impl Into<String>, value: f64) -> Self {
    Self {
      key: key.into(),
      value,
    }
  }
}

/// Running count and mean for a single key.
///
/// `mean` is always the arithmetic mean of the `count` values folded in so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateEntry {
  /// Number of values contributed. Never zero.
  pub count: u64,
  /// Mean of the contributed values.
  pub mean: f64,
}

impl AggregateEntry {
  /// Starts an entry from its first value.
  pub fn first(value: f64) -> Self {
    Self {
      count: 1,
      mean: value,
    }
  }

  /// Folds one more value into the running mean.
  pub fn update(&mut self, value: f64) {
    self.count += 1;
    let n = self.count as f64;
    // Same as `(value - mean) / n`, but the difference cannot overflow.
    self.mean += value / n - self.mean / n;
  }
}

/// One exported row: a key and its final mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanRow {
  /// Category key.
  pub key: String,
  /// Mean of every value seen for `key`.
  pub mean: f64,
}

impl MeanRow {
  /// Creates a new row.
  pub fn new(key: impl Into<String>, mean: f64) -> Self {
    Self {
      key: key.into(),
      mean,
    }
  }
}
