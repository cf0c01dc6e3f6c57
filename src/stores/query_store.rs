//! SQL-like tabular query service that loads its tables from the bulk store.
//!
//! Statements are built as [`Statement`] values and rendered to HiveQL text with
//! [`Statement::to_sql`]. [`EmbeddedQueryStore`] executes them in-process with
//! the semantics of a delimited text table:
//!
//! - each record of a loaded file is one row, fields separated by `,` with
//!   CSV quoting, so keys written by the exporter come back intact
//! - a field that does not parse as `Float` becomes NULL
//! - `LOAD DATA INPATH` moves the file out of the bulk store into the table
//!
//! A CSV header row therefore loads as a row with a NULL value, which the
//! `WHERE value IS NOT NULL` filter of the extremal queries drops.

use crate::config::QueryStoreConfig;
use crate::error::{PipelineError, Result};
use crate::record::MeanRow;
use crate::stores::bulk_store::BulkStore;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Sort direction of an extremal query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
  /// Smallest value first.
  Ascending,
  /// Largest value first.
  Descending,
}

impl SortOrder {
  fn keyword(self) -> &'static str {
    match self {
      SortOrder::Ascending => "ASC",
      SortOrder::Descending => "DESC",
    }
  }
}

/// Name and column layout of the averages table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
  /// Table name.
  pub name: String,
  /// `String` column holding the key.
  pub key_column: String,
  /// `Float` column holding the mean.
  pub value_column: String,
}

impl TableSchema {
  /// Builds the schema described by the query-store configuration.
  pub fn from_config(config: &QueryStoreConfig) -> Self {
    Self {
      name: config.table.clone(),
      key_column: config.key_column.clone(),
      value_column: config.value_column.clone(),
    }
  }
}

/// A statement understood by the query store.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
  /// `DROP TABLE IF EXISTS`.
  DropTableIfExists {
    /// Table to drop.
    table: String,
  },
  /// `CREATE TABLE` for a comma-delimited text table.
  CreateTable(TableSchema),
  /// `LOAD DATA INPATH ... INTO TABLE`.
  LoadData {
    /// Bulk store path of the file to load.
    path: String,
    /// Target table.
    table: String,
  },
  /// Single extremal row by value, ignoring NULL values.
  SelectExtremal {
    /// Table to read.
    schema: TableSchema,
    /// Which end of the ordering to return.
    order: SortOrder,
  },
}

impl Statement {
  /// Renders the statement as HiveQL.
  pub fn to_sql(&self) -> String {
    match self {
      Statement::DropTableIfExists { table } => format!("DROP TABLE IF EXISTS {}", table),
      Statement::CreateTable(schema) => format!(
        "CREATE TABLE {} ({} String, {} Float) ROW FORMAT DELIMITED FIELDS TERMINATED BY ',' STORED AS TEXTFILE",
        schema.name, schema.key_column, schema.value_column
      ),
      Statement::LoadData { path, table } => {
        format!("LOAD DATA INPATH '{}' INTO TABLE {}", path, table)
      }
      Statement::SelectExtremal { schema, order } => format!(
        "SELECT {key}, {value} FROM {table} WHERE {value} IS NOT NULL ORDER BY {value} {order} LIMIT 1",
        key = schema.key_column,
        value = schema.value_column,
        table = schema.name,
        order = order.keyword()
      ),
    }
  }
}

impl fmt::Display for Statement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_sql())
  }
}

/// An open session with a query store.
#[async_trait]
pub trait QueryConnection: Send {
  /// Runs a statement. DDL and DML return no rows.
  async fn execute(&mut self, statement: &Statement) -> Result<Vec<MeanRow>>;

  /// Releases the session. Calling it again has no effect.
  fn close(&mut self);

  /// True once [`close`](Self::close) has been called.
  fn is_closed(&self) -> bool;
}

/// A query service that hands out connections.
#[async_trait]
pub trait QueryStore: Send + Sync {
  /// Connection type returned by [`connect`](Self::connect).
  type Connection: QueryConnection;

  /// Opens a new connection.
  async fn connect(&self) -> Result<Self::Connection>;
}

#[derive(Debug)]
struct Table {
  schema: TableSchema,
  rows: Vec<(String, Option<f64>)>,
}

type Tables = Arc<Mutex<HashMap<String, Table>>>;

/// In-process query store over a [`BulkStore`].
#[derive(Debug)]
pub struct EmbeddedQueryStore<B: BulkStore> {
  config: QueryStoreConfig,
  bulk: Arc<B>,
  tables: Tables,
  open_connections: Arc<AtomicUsize>,
}

impl<B: BulkStore> EmbeddedQueryStore<B> {
  /// Creates a store reading loaded files from `bulk`.
  pub fn new(config: QueryStoreConfig, bulk: Arc<B>) -> Self {
    Self {
      config,
      bulk,
      tables: Arc::new(Mutex::new(HashMap::new())),
      open_connections: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// Number of connections that have not been closed yet.
  pub fn open_connections(&self) -> usize {
    self.open_connections.load(AtomicOrdering::SeqCst)
  }

  /// Number of rows currently in `table`, or `None` if it does not exist.
  pub fn row_count(&self, table: &str) -> Option<usize> {
    let tables = self.tables.lock().ok()?;
    tables.get(table).map(|t| t.rows.len())
  }
}

#[async_trait]
impl<B: BulkStore + 'static> QueryStore for EmbeddedQueryStore<B> {
  type Connection = EmbeddedConnection<B>;

  async fn connect(&self) -> Result<Self::Connection> {
    self.open_connections.fetch_add(1, AtomicOrdering::SeqCst);
    info!(address = %self.config.address(), "Opened query store connection");
    Ok(EmbeddedConnection {
      bulk: Arc::clone(&self.bulk),
      tables: Arc::clone(&self.tables),
      open_connections: Arc::clone(&self.open_connections),
      closed: false,
    })
  }
}

/// Connection to an [`EmbeddedQueryStore`].
#[derive(Debug)]
pub struct EmbeddedConnection<B: BulkStore> {
  bulk: Arc<B>,
  tables: Tables,
  open_connections: Arc<AtomicUsize>,
  closed: bool,
}

impl<B: BulkStore> EmbeddedConnection<B> {
  fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<String, Table>) -> Result<T>) -> Result<T> {
    let mut tables = self
      .tables
      .lock()
      .map_err(|_| PipelineError::QueryStore("table catalog lock poisoned".to_string()))?;
    f(&mut tables)
  }

  async fn load(&self, path: &str, table: &str) -> Result<usize> {
    self.with_tables(|tables| {
      if tables.contains_key(table) {
        Ok(())
      } else {
        Err(PipelineError::QueryStore(format!("table not found: {}", table)))
      }
    })?;

    let bytes = self.bulk.read(path).await?;
    let rows = parse_text_rows(&bytes)?;
    let loaded = rows.len();

    self.with_tables(|tables| {
      let target = tables
        .get_mut(table)
        .ok_or_else(|| PipelineError::QueryStore(format!("table not found: {}", table)))?;
      target.rows.extend(rows);
      Ok(())
    })?;

    self.bulk.remove(path).await?;
    Ok(loaded)
  }

  fn select(&self, schema: &TableSchema, order: SortOrder) -> Result<Vec<MeanRow>> {
    self.with_tables(|tables| {
      let table = tables
        .get(&schema.name)
        .ok_or_else(|| PipelineError::QueryStore(format!("table not found: {}", schema.name)))?;
      if table.schema.key_column != schema.key_column
        || table.schema.value_column != schema.value_column
      {
        return Err(PipelineError::QueryStore(format!(
          "unknown columns {}, {} in table {}",
          schema.key_column, schema.value_column, schema.name
        )));
      }

      let candidates = table
        .rows
        .iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)));
      let compare = |a: &(&String, f64), b: &(&String, f64)| {
        a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal)
      };
      let best = match order {
        SortOrder::Ascending => candidates.min_by(compare),
        SortOrder::Descending => candidates.max_by(compare),
      };
      Ok(
        best
          .map(|(key, value)| MeanRow::new(key.clone(), value))
          .into_iter()
          .collect(),
      )
    })
  }
}

/// Reads a comma-delimited text table into `(String, Float)` rows.
///
/// Quoting follows the CSV writer used for the export. A missing or
/// non-numeric second field is NULL.
fn parse_text_rows(bytes: &[u8]) -> Result<Vec<(String, Option<f64>)>> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .delimiter(b',')
    .flexible(true)
    .from_reader(bytes);

  let mut rows = Vec::new();
  for record in reader.records() {
    let record = record?;
    let key = record.get(0).unwrap_or_default().to_string();
    let value = record
      .get(1)
      .and_then(|field| field.trim().parse::<f64>().ok());
    rows.push((key, value));
  }
  Ok(rows)
}

#[async_trait]
impl<B: BulkStore + 'static> QueryConnection for EmbeddedConnection<B> {
  async fn execute(&mut self, statement: &Statement) -> Result<Vec<MeanRow>> {
    if self.closed {
      return Err(PipelineError::QueryStore("connection is closed".to_string()));
    }
    debug!(sql = %statement, "Executing statement");

    match statement {
      Statement::DropTableIfExists { table } => {
        self.with_tables(|tables| {
          tables.remove(table);
          Ok(())
        })?;
        Ok(Vec::new())
      }
      Statement::CreateTable(schema) => {
        self.with_tables(|tables| {
          if tables.contains_key(&schema.name) {
            return Err(PipelineError::QueryStore(format!(
              "table already exists: {}",
              schema.name
            )));
          }
          tables.insert(
            schema.name.clone(),
            Table {
              schema: schema.clone(),
              rows: Vec::new(),
            },
          );
          Ok(())
        })?;
        Ok(Vec::new())
      }
      Statement::LoadData { path, table } => {
        let loaded = self.load(path, table).await?;
        info!(path = %path, table = %table, rows = loaded, "Loaded data into table");
        Ok(Vec::new())
      }
      Statement::SelectExtremal { schema, order } => self.select(schema, *order),
    }
  }

  fn close(&mut self) {
    if !self.closed {
      self.closed = true;
      self.open_connections.fetch_sub(1, AtomicOrdering::SeqCst);
      debug!("Closed query store connection");
    }
  }

  fn is_closed(&self) -> bool {
    self.closed
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::stores::bulk_store::LocalBulkStore;
  use tempfile::{NamedTempFile, TempDir};

  fn schema() -> TableSchema {
    TableSchema::from_config(&QueryStoreConfig::default())
  }

  async fn store_with_file(content: &str) -> (TempDir, EmbeddedQueryStore<LocalBulkStore>) {
    let root = TempDir::new().unwrap();
    let bulk = Arc::new(LocalBulkStore::new(root.path()));
    let local = NamedTempFile::new().unwrap();
    std::fs::write(local.path(), content).unwrap();
    bulk.upload(local.path(), "/in/data.csv", true).await.unwrap();
    (root, EmbeddedQueryStore::new(QueryStoreConfig::default(), bulk))
  }

  async fn create_and_load(conn: &mut EmbeddedConnection<LocalBulkStore>) {
    conn
      .execute(&Statement::DropTableIfExists {
        table: "car_prices".to_string(),
      })
      .await
      .unwrap();
    conn.execute(&Statement::CreateTable(schema())).await.unwrap();
    conn
      .execute(&Statement::LoadData {
        path: "/in/data.csv".to_string(),
        table: "car_prices".to_string(),
      })
      .await
      .unwrap();
  }

  #[test]
  fn test_statement_sql() {
    let schema = schema();

    assert_eq!(
      Statement::DropTableIfExists {
        table: "car_prices".to_string()
      }
      .to_sql(),
      "DROP TABLE IF EXISTS car_prices"
    );
    assert_eq!(
      Statement::CreateTable(schema.clone()).to_sql(),
      "CREATE TABLE car_prices (key String, value Float) ROW FORMAT DELIMITED FIELDS TERMINATED BY ',' STORED AS TEXTFILE"
    );
    assert_eq!(
      Statement::LoadData {
        path: "/user/student/out.csv".to_string(),
        table: "car_prices".to_string()
      }
      .to_sql(),
      "LOAD DATA INPATH '/user/student/out.csv' INTO TABLE car_prices"
    );
    assert_eq!(
      Statement::SelectExtremal {
        schema: schema.clone(),
        order: SortOrder::Descending
      }
      .to_string(),
      "SELECT key, value FROM car_prices WHERE value IS NOT NULL ORDER BY value DESC LIMIT 1"
    );
  }

  #[test]
  fn test_parse_text_rows() {
    let rows = parse_text_rows(
      b"key,mean\nBMW,61546.76\nlonely\n\"Rolls, Royce\",900000\n\"Say \"\"hi\"\"\",2\n",
    )
    .unwrap();

    assert_eq!(
      rows,
      vec![
        ("key".to_string(), None),
        ("BMW".to_string(), Some(61546.76)),
        ("lonely".to_string(), None),
        ("Rolls, Royce".to_string(), Some(900000.0)),
        ("Say \"hi\"".to_string(), Some(2.0)),
      ]
    );
  }

  #[tokio::test]
  async fn test_load_and_select_extremes() {
    let (_root, store) = store_with_file("key,mean\nAudi,40000\nBMW,53067.5\nFiat,15000.25\n").await;
    let mut conn = store.connect().await.unwrap();
    create_and_load(&mut conn).await;

    let min = conn
      .execute(&Statement::SelectExtremal {
        schema: schema(),
        order: SortOrder::Ascending,
      })
      .await
      .unwrap();
    let max = conn
      .execute(&Statement::SelectExtremal {
        schema: schema(),
        order: SortOrder::Descending,
      })
      .await
      .unwrap();

    assert_eq!(min, vec![MeanRow::new("Fiat", 15000.25)]);
    assert_eq!(max, vec![MeanRow::new("BMW", 53067.5)]);
    // Header row loads with a NULL value.
    assert_eq!(store.row_count("car_prices"), Some(4));
  }

  #[tokio::test]
  async fn test_load_moves_file_out_of_bulk_store() {
    let (root, store) = store_with_file("A,1\n").await;
    let mut conn = store.connect().await.unwrap();
    create_and_load(&mut conn).await;

    assert!(!root.path().join("in/data.csv").exists());
  }

  #[tokio::test]
  async fn test_select_on_empty_table() {
    let (_root, store) = store_with_file("key,mean\n").await;
    let mut conn = store.connect().await.unwrap();
    create_and_load(&mut conn).await;

    let rows = conn
      .execute(&Statement::SelectExtremal {
        schema: schema(),
        order: SortOrder::Ascending,
      })
      .await
      .unwrap();
    assert!(rows.is_empty());
  }

  #[tokio::test]
  async fn test_create_existing_table_fails() {
    let (_root, store) = store_with_file("").await;
    let mut conn = store.connect().await.unwrap();

    conn.execute(&Statement::CreateTable(schema())).await.unwrap();
    let result = conn.execute(&Statement::CreateTable(schema())).await;

    assert!(matches!(result, Err(PipelineError::QueryStore(_))));
  }

  #[tokio::test]
  async fn test_load_into_missing_table_fails() {
    let (root, store) = store_with_file("A,1\n").await;
    let mut conn = store.connect().await.unwrap();

    let result = conn
      .execute(&Statement::LoadData {
        path: "/in/data.csv".to_string(),
        table: "nope".to_string(),
      })
      .await;

    assert!(matches!(result, Err(PipelineError::QueryStore(_))));
    assert!(root.path().join("in/data.csv").exists());
  }

  #[tokio::test]
  async fn test_closed_connection_rejects_statements() {
    let (_root, store) = store_with_file("").await;
    let mut conn = store.connect().await.unwrap();
    assert_eq!(store.open_connections(), 1);

    conn.close();
    conn.close();

    assert!(conn.is_closed());
    assert_eq!(store.open_connections(), 0);
    let result = conn
      .execute(&Statement::DropTableIfExists {
        table: "t".to_string(),
      })
      .await;
    assert!(matches!(result, Err(PipelineError::QueryStore(_))));
  }
}
