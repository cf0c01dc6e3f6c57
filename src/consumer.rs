//! # Consumer Trait
//!
//! Consumers are the end of a pipeline: they drain a stream and do something
//! with every item, such as writing it to a file.
//!
//! A consumer returns the first error it sees on its input (or hits while
//! handling an item) and stops reading.

use crate::error::{ComponentInfo, PipelineError};
use crate::input::Input;
use async_trait::async_trait;

/// Configuration shared by all consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerConfig {
  /// Name for identifying this consumer in logs. Empty means unnamed.
  pub name: String,
}

impl ConsumerConfig {
  /// Sets the name for this consumer configuration.
  #[must_use]
  pub fn with_name(mut self, name: String) -> Self {
    self.name = name;
    self
  }

  /// Returns the current name.
  pub fn name(&self) -> String {
    self.name.clone()
  }
}

/// Trait for components that consume data streams.
#[async_trait]
pub trait Consumer: Input {
  /// Consumes the whole input stream.
  async fn consume(&mut self, input: Self::InputStream) -> Result<(), PipelineError>;

  /// Sets the configuration for this consumer.
  fn set_config(&mut self, config: ConsumerConfig) {
    self.set_config_impl(config);
  }

  /// Returns a reference to the consumer's configuration.
  fn config(&self) -> &ConsumerConfig {
    self.get_config_impl()
  }

  /// Sets the name for this consumer.
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
    let name = self.config().name();
    let name = if name.is_empty() {
      self.default_name().to_string()
    } else {
      name
    };
    ComponentInfo::new(name, std::any::type_name::<Self>().to_string())
  }

  /// Stores a new configuration.
  fn set_config_impl(&mut self, config: ConsumerConfig);

  /// Returns the stored configuration.
  fn get_config_impl(&self) -> &ConsumerConfig;
}
