//! Incremental per-key averaging.
//!
//! [`StreamingAverager`] folds `(key, value)` records into one running
//! `(count, mean)` pair per key using the Welford update
//! `mean += (value - mean) / count`. Raw values are never stored, so memory is
//! O(1) per key and long streams do not accumulate a large running sum.
//!
//! # Example
//!
//! ```rust
//! use price_averages::averager::StreamingAverager;
//! use price_averages::record::Record;
//!
//! let aggregate = StreamingAverager::new()
//!   .fold(vec![
//!     Ok(Record::new("A", 10.0)),
//!     Ok(Record::new("A", 20.0)),
//!     Ok(Record::new("B", 5.0)),
//!   ])
//!   .unwrap();
//!
//! assert_eq!(aggregate.get("A").unwrap().mean, 15.0);
//! assert_eq!(aggregate.get("B").unwrap().count, 1);
//! ```

use crate::error::{PipelineError, Result};
use crate::record::{AggregateEntry, MeanRow, Record};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::debug;

/// The key → entry mapping produced by one averaging pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
  entries: HashMap<String, AggregateEntry>,
  records: u64,
}

impl Aggregate {
  /// Returns the entry for `key`, if the key was seen.
  pub fn get(&self, key: &str) -> Option<&AggregateEntry> {
    self.entries.get(key)
  }

  /// Number of distinct keys.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// True when no record was folded.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Total number of records folded.
  pub fn records(&self) -> u64 {
    self.records
  }

  /// Iterates over entries in arbitrary order.
  pub fn iter(&self) -> impl Iterator<Item = (&String, &AggregateEntry)> {
    self.entries.iter()
  }

  /// Converts the mapping into export rows, sorted by key.
  pub fn into_rows(self) -> Vec<MeanRow> {
    let mut rows: Vec<MeanRow> = self
      .entries
      .into_iter()
      .map(|(key, entry)| MeanRow::new(key, entry.mean))
      .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));
    rows
  }
}

/// Folds a record stream into per-key running means.
#[derive(Debug, Clone, Default)]
pub struct StreamingAverager {
  aggregate: Aggregate,
  require_records: bool,
}

impl StreamingAverager {
  /// Creates an averager with no entries.
  pub fn new() -> Self {
    Self::default()
  }

  /// When set, finishing a pass that saw no records fails with
  /// [`PipelineError::EmptyStream`] instead of returning an empty mapping.
  #[must_use]
  pub fn require_records(mut self, require: bool) -> Self {
    self.require_records = require;
    self
  }

  /// Folds a single record into the running state.
  pub fn push(&mut self, record: Record) {
    self.aggregate.records += 1;
    match self.aggregate.entries.entry(record.key) {
      Entry::Occupied(mut occupied) => occupied.get_mut().update(record.value),
      Entry::Vacant(vacant) => {
        debug!(key = %vacant.key(), "New key");
        vacant.insert(AggregateEntry::first(record.value));
      }
    }
  }

  /// Ends the pass and hands the mapping to the caller.
  pub fn finish(self) -> Result<Aggregate> {
    if self.require_records && self.aggregate.records == 0 {
      return Err(PipelineError::EmptyStream);
    }
    Ok(self.aggregate)
  }

  /// Folds every record of `records`, stopping at the first error.
  ///
  /// On error the partial state is dropped; nothing is returned but the error.
  pub fn fold<I>(mut self, records: I) -> Result<Aggregate>
  where
    I: IntoIterator<Item = Result<Record>>,
  {
    for record in records {
      self.push(record?);
    }
    self.finish()
  }

  /// Async counterpart of [`fold`](Self::fold) for record streams.
  pub async fn fold_stream<S>(mut self, records: S) -> Result<Aggregate>
  where
    S: Stream<Item = Result<Record>>,
  {
    let mut records = std::pin::pin!(records);
    while let Some(record) = records.next().await {
      self.push(record?);
    }
    self.finish()
  }
}
