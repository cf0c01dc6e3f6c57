//! Output trait for components that produce output streams.
//!
//! The [`Output`] trait is implemented by producers that generate data for
//! downstream components. It mirrors [`Input`]: an output
//! stream yields `Result<Output, PipelineError>` items, so the types of two
//! adjacent components line up when the output of one is the input of the next.

// Import for rustdoc links
#[allow(unused_imports)]
use crate::input::Input;

use crate::error::PipelineError;
use futures::Stream;

/// Trait for components that produce an output stream.
pub trait Output
where
  Self::Output: Send + 'static,
{
  /// The type of items carried by the output stream.
  type Output;
  /// The output stream type, yielding `Result<Self::Output, PipelineError>`.
  type OutputStream: Stream<Item = Result<Self::Output, PipelineError>> + Send + 'static;
}
