use crate::BoxedStream;
use crate::config::SinkConfig;
use crate::consumer::{Consumer, ConsumerConfig};
use crate::error::PipelineError;
use crate::input::Input;
use crate::record::MeanRow;
use async_trait::async_trait;
use csv::WriterBuilder;
use futures::StreamExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// A consumer that writes `(key, mean)` rows to a CSV file.
///
/// The target file is truncated, the header row is written first, then one
/// line per row in stream order. Means are written unrounded.
///
/// If the input stream carries an error, writing stops and the error is
/// returned. The file is left with whatever was written before the error.
///
/// # Example
///
/// ```rust,no_run
/// use price_averages::consumers::CsvMeanConsumer;
///
/// let consumer = CsvMeanConsumer::new("transformed-data.csv")
///   .with_header("Make", "MSRP");
/// ```
#[derive(Debug, Clone)]
pub struct CsvMeanConsumer {
  /// Consumer configuration.
  pub config: ConsumerConfig,
  /// Sink settings.
  pub sink: SinkConfig,
  /// Number of data rows written by the last `consume` call.
  pub rows_written: usize,
}

impl CsvMeanConsumer {
  /// Creates a consumer writing to `path` with the default header.
  #[must_use]
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self::from_config(SinkConfig {
      path: path.into(),
      ..SinkConfig::default()
    })
  }

  /// Creates a consumer from sink settings.
  #[must_use]
  pub fn from_config(sink: SinkConfig) -> Self {
    Self {
      config: ConsumerConfig::default(),
      sink,
      rows_written: 0,
    }
  }

  /// Sets the header row.
  #[must_use]
  pub fn with_header(mut self, key: impl Into<String>, mean: impl Into<String>) -> Self {
    self.sink.header = [key.into(), mean.into()];
    self
  }

  /// Returns the file path.
  #[must_use]
  pub fn path(&self) -> &Path {
    &self.sink.path
  }
}

impl Input for CsvMeanConsumer {
  type Input = MeanRow;
  type InputStream = BoxedStream<MeanRow>;
}

#[async_trait]
impl Consumer for CsvMeanConsumer {
  async fn consume(&mut self, input: Self::InputStream) -> Result<(), PipelineError> {
    let component = self.component_info();
    let path = self.sink.path.clone();

    let file = File::create(&path).inspect_err(|e| {
      error!(
        component = %component.name,
        path = %path.display(),
        error = %e,
        "Failed to create CSV file for writing"
      );
    })?;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(&self.sink.header)?;

    self.rows_written = 0;
    let mut input = input;
    while let Some(item) = input.next().await {
      let row = item?;
      let mean = row.mean.to_string();
      writer.write_record([row.key.as_str(), mean.as_str()])?;
      self.rows_written += 1;
    }

    writer.flush()?;
    info!(
      component = %component.name,
      path = %path.display(),
      rows = self.rows_written,
      "Wrote CSV file"
    );
    Ok(())
  }

  fn default_name(&self) -> &'static str {
    "csv_mean_consumer"
  }

  fn set_config_impl(&mut self, config: ConsumerConfig) {
    self.config = config;
  }

  fn get_config_impl(&self) -> &ConsumerConfig {
    &self.config
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::stream;
  use tempfile::NamedTempFile;

  fn rows(items: Vec<Result<MeanRow, PipelineError>>) -> BoxedStream<MeanRow> {
    Box::pin(stream::iter(items))
  }

  #[tokio::test]
  async fn test_csv_consumer_basic() {
    let file = NamedTempFile::new().unwrap();

    let mut consumer = CsvMeanConsumer::new(file.path());
    consumer
      .consume(rows(vec![
        Ok(MeanRow::new("Audi", 40000.0)),
        Ok(MeanRow::new("BMW", 53067.5)),
      ]))
      .await
      .unwrap();

    let content = std::fs::read_to_string(file.path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();

    assert_eq!(lines, vec!["key,mean", "Audi,40000", "BMW,53067.5"]);
    assert_eq!(consumer.rows_written, 2);
  }

  #[tokio::test]
  async fn test_csv_consumer_custom_header() {
    let file = NamedTempFile::new().unwrap();

    let mut consumer = CsvMeanConsumer::new(file.path()).with_header("Make", "MSRP");
    consumer
      .consume(rows(vec![Ok(MeanRow::new("Ford", 1.25))]))
      .await
      .unwrap();

    let content = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(content, "Make,MSRP\nFord,1.25\n");
  }

  #[tokio::test]
  async fn test_csv_consumer_overwrites_existing_file() {
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "stale,data\nmore,stale\nlines,here\n").unwrap();

    let mut consumer = CsvMeanConsumer::new(file.path());
    consumer.consume(rows(vec![])).await.unwrap();

    let content = std::fs::read_to_string(file.path()).unwrap();
    assert_eq!(content, "key,mean\n");
  }

  #[tokio::test]
  async fn test_csv_consumer_round_trip() {
    let file = NamedTempFile::new().unwrap();
    let written = vec![
      MeanRow::new("Alfa Romeo", 61600.0),
      MeanRow::new("Mercedes-Benz, AG", 71476.22988505747),
      MeanRow::new("tiny", 1.0e-7),
    ];

    let mut consumer = CsvMeanConsumer::new(file.path());
    consumer
      .consume(rows(written.iter().cloned().map(Ok).collect()))
      .await
      .unwrap();

    let mut reader = csv::Reader::from_path(file.path()).unwrap();
    let read: Vec<MeanRow> = reader.deserialize().map(|r| r.unwrap()).collect();

    assert_eq!(read, written);
  }

  #[tokio::test]
  async fn test_csv_consumer_stops_on_error() {
    let file = NamedTempFile::new().unwrap();

    let mut consumer = CsvMeanConsumer::new(file.path());
    let result = consumer
      .consume(rows(vec![
        Ok(MeanRow::new("A", 1.0)),
        Err(PipelineError::EmptyStream),
        Ok(MeanRow::new("B", 2.0)),
      ]))
      .await;

    assert!(matches!(result, Err(PipelineError::EmptyStream)));
    assert_eq!(consumer.rows_written, 1);
  }

  #[tokio::test]
  async fn test_csv_consumer_unwritable_path() {
    let mut consumer = CsvMeanConsumer::new("/no/such/dir/out.csv");
    let result = consumer.consume(rows(vec![])).await;

    assert!(matches!(result, Err(PipelineError::Io(_))));
  }

  #[test]
  fn test_csv_consumer_component_info() {
    let consumer = CsvMeanConsumer::new("out.csv").with_name("export".to_string());
    assert_eq!(consumer.component_info().name, "export");

    let unnamed = CsvMeanConsumer::new("out.csv");
    assert_eq!(unnamed.component_info().name, "csv_mean_consumer");
  }
}
