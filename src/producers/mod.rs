//! Built-in producers.

/// Producer that reads `(key, value)` records from a CSV file.
pub mod csv_producer;

pub use csv_producer::CsvRecordProducer;
