//! # Producer Trait
//!
//! Producers are the starting point of a pipeline: they generate the stream of
//! items that is folded or drained downstream.
//!
//! ## Example
//!
//! ```rust,no_run
//! use price_averages::producer::Producer;
//! use price_averages::producers::CsvRecordProducer;
//! use futures::StreamExt;
//!
//! # async fn example() {
//! let mut producer = CsvRecordProducer::new("data.csv");
//! let mut stream = producer.produce();
//! while let Some(record) = stream.next().await {
//!   println!("{:?}", record);
//! }
//! # }
//! ```

use crate::error::ComponentInfo;
use crate::output::Output;

/// Configuration shared by all producers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerConfig {
  /// Optional name for identifying this producer in logs.
  pub name: Option<String>,
}

impl ProducerConfig {
  /// Sets the name for this producer configuration.
  #[must_use]
  pub fn with_name(mut self, name: String) -> Self {
    self.name = Some(name);
    self
  }

  /// Returns the current name, if set.
  pub fn name(&self) -> Option<String> {
    self.name.clone()
  }
}

/// Trait for components that produce data streams.
///
/// The returned stream is lazy: nothing is read until it is polled. A producer
/// that fails yields a single `Err` item and then ends.
pub trait Producer: Output {
  /// Produces a stream of items.
  fn produce(&mut self) -> Self::OutputStream;

  /// Sets the configuration for this producer.
  fn set_config(&mut self, config: ProducerConfig) {
    self.set_config_impl(config);
  }

  /// Returns a reference to the producer's configuration.
  fn config(&self) -> &ProducerConfig {
    self.get_config_impl()
  }

  /// Sets the name for this producer.
  #[must_use]
  fn with_name(mut self, name: String) -> Self
  where
    Self: Sized,
  {
    let config = self.get_config_impl().clone().with_name(name);
    self.set_config(config);
    self
  }

  /// Name used when the configuration does not provide one.
  fn default_name(&self) -> &'static str;

  /// Returns information about the component for logging.
  fn component_info(&self) -> ComponentInfo {
    ComponentInfo::new(
      self
        .config()
        .name()
        .unwrap_or_else(|| self.default_name().to_string()),
      std::any::type_name::<Self>().to_string(),
    )
  }

  /// Stores a new configuration.
  fn set_config_impl(&mut self, config: ProducerConfig);

  /// Returns the stored configuration.
  fn get_config_impl(&self) -> &ProducerConfig;
}
