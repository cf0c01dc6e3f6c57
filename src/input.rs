//! Input trait for components that consume input streams.
//!
//! The [`Input`] trait is implemented by consumers that receive data from an
//! upstream component.
//!
//! # Key Concepts
//!
//! - **Input Type**: `Input::Input` is the payload type, e.g. a [`Record`](crate::record::Record)
//! - **InputStream**: a pinned, boxed async stream yielding `Result<Input, PipelineError>`
//! - **In-band errors**: an upstream failure arrives as an `Err` item, after
//!   which the stream carries nothing further
//!
//! # Example
//!
//! ```rust
//! use price_averages::input::Input;
//! use price_averages::record::Record;
//! use price_averages::BoxedStream;
//!
//! struct Sink;
//!
//! impl Input for Sink {
//!   type Input = Record;
//!   type InputStream = BoxedStream<Record>;
//! }
//! ```

use crate::error::PipelineError;
use futures::Stream;
// Import for rustdoc link
#[allow(unused_imports)]
use crate::output::Output;

/// Trait for components that accept an input stream.
pub trait Input
where
  Self::Input: Send + 'static,
{
  /// The type of items carried by the input stream.
  type Input;
  /// The input stream type, yielding `Result<Self::Input, PipelineError>`.
  type InputStream: Stream<Item = Result<Self::Input, PipelineError>> + Send + 'static;
}
