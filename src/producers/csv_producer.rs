use crate::BoxedStream;
use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};
use crate::output::Output;
use crate::producer::{Producer, ProducerConfig};
use crate::record::Record;
use csv::{StringRecord, Trim};
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Sender;
use tracing::{error, info};

/// Bound of the channel between the blocking reader and the async stream.
const CHANNEL_CAPACITY: usize = 100;

/// A producer that reads `(key, value)` records from a delimited file.
///
/// The file must start with a header row naming at least the key column and
/// the value column. Every data row yields one [`Record`]. A value that is not
/// a finite number ends the stream with [`PipelineError::MalformedRecord`].
///
/// # Example
///
/// ```rust,no_run
/// use price_averages::producers::CsvRecordProducer;
///
/// let producer = CsvRecordProducer::new("data.csv")
///   .with_columns("Make", "MSRP");
/// ```
#[derive(Debug, Clone)]
pub struct CsvRecordProducer {
  /// Producer configuration.
  pub config: ProducerConfig,
  /// Source settings.
  pub source: SourceConfig,
}

impl CsvRecordProducer {
  /// Creates a producer for `path` with the default column names.
  #[must_use]
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self::from_config(SourceConfig {
      path: path.into(),
      ..SourceConfig::default()
    })
  }

  /// Creates a producer from source settings.
  #[must_use]
  pub fn from_config(source: SourceConfig) -> Self {
    Self {
      config: ProducerConfig::default(),
      source,
    }
  }

  /// Sets the key and value column names.
  #[must_use]
  pub fn with_columns(mut self, key_column: impl Into<String>, value_column: impl Into<String>) -> Self {
    self.source.key_column = key_column.into();
    self.source.value_column = value_column.into();
    self
  }

  /// Sets the delimiter character.
  #[must_use]
  pub fn with_delimiter(mut self, delimiter: u8) -> Self {
    self.source.delimiter = delimiter;
    self
  }

  /// Returns the file path.
  #[must_use]
  pub fn path(&self) -> &Path {
    &self.source.path
  }
}

impl Output for CsvRecordProducer {
  type Output = Record;
  type OutputStream = BoxedStream<Record>;
}

impl Producer for CsvRecordProducer {
  /// Produces a stream of records, one per data row.
  ///
  /// CSV reading is synchronous, so the file is read on a blocking thread and
  /// records are handed over through a bounded channel.
  fn produce(&mut self) -> Self::OutputStream {
    let source = self.source.clone();
    let component = self.component_info();

    Box::pin(async_stream::stream! {
      let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<Record>>(CHANNEL_CAPACITY);

      let handle = tokio::task::spawn_blocking(move || {
        if let Err(e) = read_records(&source, &tx) {
          let _ = tx.blocking_send(Err(e));
        }
      });

      let mut produced: u64 = 0;
      let mut failed = false;
      while let Some(result) = rx.recv().await {
        match result {
          Ok(record) => {
            produced += 1;
            yield Ok(record);
          }
          Err(e) => {
            error!(
              component = %component.name,
              error = %e,
              "Error reading CSV record"
            );
            failed = true;
            yield Err(e);
            break;
          }
        }
      }

      // Wait for the blocking task to finish
      if let Err(e) = handle.await {
        yield Err(PipelineError::Io(std::io::Error::other(e)));
      } else if !failed {
        info!(component = %component.name, records = produced, "Finished reading CSV");
      }
    })
  }

  fn default_name(&self) -> &'static str {
    "csv_record_producer"
  }

  fn set_config_impl(&mut self, config: ProducerConfig) {
    self.config = config;
  }

  fn get_config_impl(&self) -> &ProducerConfig {
    &self.config
  }
}

/// Reads every data row of the source file into `tx`.
///
/// Returns early without error if the receiving side has gone away.
fn read_records(source: &SourceConfig, tx: &Sender<Result<Record>>) -> Result<()> {
  let file = File::open(&source.path).map_err(|e| match e.kind() {
    ErrorKind::NotFound => PipelineError::SourceNotFound {
      path: source.path.clone(),
    },
    _ => PipelineError::Io(e),
  })?;

  let mut reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .delimiter(source.delimiter)
    .trim(if source.trim { Trim::All } else { Trim::None })
    .from_reader(BufReader::new(file));

  let headers = reader.headers()?.clone();
  let key_index = column_index(&headers, &source.key_column, &source.path)?;
  let value_index = column_index(&headers, &source.value_column, &source.path)?;

  let mut row = StringRecord::new();
  while reader.read_record(&mut row)? {
    let line = row.position().map(|p| p.line()).unwrap_or_default();
    let key = row.get(key_index).unwrap_or_default();
    let raw = row.get(value_index).unwrap_or_default();
    let value = parse_value(raw).ok_or_else(|| PipelineError::MalformedRecord {
      line,
      column: source.value_column.clone(),
      value: raw.to_string(),
    })?;

    if tx.blocking_send(Ok(Record::new(key, value))).is_err() {
      break;
    }
  }
  Ok(())
}

fn column_index(headers: &StringRecord, column: &str, path: &Path) -> Result<usize> {
  headers
    .iter()
    .position(|h| h == column)
    .ok_or_else(|| PipelineError::MissingColumn {
      column: column.to_string(),
      path: path.to_path_buf(),
    })
}

/// Parses a numeric field, rejecting NaN and infinities.
fn parse_value(raw: &str) -> Option<f64> {
  raw
    .trim()
    .parse::<f64>()
    .ok()
    .filter(|value| value.is_finite())
}
