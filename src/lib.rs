//! # price-averages
//!
//! Streaming per-category averages over a CSV dataset, exported to CSV and
//! pushed through a bulk store and a query store.
//!
//! ## Key Features
//!
//! - **Incremental means**: one `(count, mean)` pair per key, updated with the
//!   Welford rule, no raw values retained
//! - **Fail-fast**: a malformed record aborts the whole pass, no partial output
//! - **Producer / Consumer components**: async streams of `Result<T, PipelineError>`
//! - **Pluggable stores**: bulk and query stores sit behind traits
//!
//! ## Quick Start
//!
//! ```rust
//! use price_averages::averager::StreamingAverager;
//! use price_averages::record::Record;
//!
//! let aggregate = StreamingAverager::new()
//!   .fold(vec![
//!     Ok(Record::new("A", 100.0)),
//!     Ok(Record::new("A", 200.0)),
//!     Ok(Record::new("A", 300.0)),
//!   ])
//!   .unwrap();
//! assert_eq!(aggregate.get("A").unwrap().mean, 200.0);
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

use futures::Stream;
use std::pin::Pin;

/// Incremental per-key averaging.
pub mod averager;
/// Pipeline configuration.
pub mod config;
/// Consumer trait and configuration.
pub mod consumer;
/// Built-in consumers.
pub mod consumers;
/// Error types.
pub mod error;
/// Input trait for stream consumers.
pub mod input;
/// Output trait for stream producers.
pub mod output;
/// End-to-end pipeline.
pub mod pipeline;
/// Producer trait and configuration.
pub mod producer;
/// Built-in producers.
pub mod producers;
/// Records, aggregate entries and export rows.
pub mod record;
/// Bulk store and query store collaborators.
pub mod stores;


pub use averager::{Aggregate, StreamingAverager};
pub use config::PipelineConfig;
pub use consumer::Consumer;
pub use error::{PipelineError, PipelineFailure, PipelineStage};
pub use input::Input;
pub use output::Output;
pub use pipeline::{Pipeline, PipelineReport};
pub use producer::Producer;
pub use record::{AggregateEntry, MeanRow, Record};

/// Boxed stream of component items, the stream type used by every built-in component.
pub type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, PipelineError>> + Send>>;
