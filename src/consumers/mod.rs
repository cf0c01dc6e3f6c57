//! Built-in consumers.

/// Consumer that writes mean rows to a CSV file.
pub mod csv_consumer;

pub use csv_consumer::CsvMeanConsumer;
