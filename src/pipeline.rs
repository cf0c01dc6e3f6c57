//! # Pipeline
//!
//! Runs the full flow for one dataset:
//!
//! 1. read records with [`CsvRecordProducer`] and fold them with [`StreamingAverager`]
//! 2. write the means with [`CsvMeanConsumer`]
//! 3. upload the file into a [`BulkStore`]
//! 4. drop, create and load the table in a [`QueryStore`]
//! 5. read back the rows with the lowest and highest mean
//!
//! Stages run strictly in order. The first failure stops the run and is
//! returned as a [`PipelineFailure`] naming the stage. The query-store
//! connection is closed on every exit path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use price_averages::config::PipelineConfig;
//! use price_averages::pipeline::Pipeline;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::local(PipelineConfig::default());
//! let report = pipeline.run().await?;
//! println!("{:?}", report.most_expensive);
//! # Ok(())
//! # }
//! ```

use crate::averager::{Aggregate, StreamingAverager};
use crate::config::PipelineConfig;
use crate::consumer::Consumer;
use crate::consumers::CsvMeanConsumer;
use crate::error::{PipelineError, PipelineFailure, PipelineStage, Result, StageContext};
use crate::producer::Producer;
use crate::producers::CsvRecordProducer;
use crate::record::MeanRow;
use crate::stores::{
  BulkStore, EmbeddedQueryStore, LocalBulkStore, QueryConnection, QueryStore, SortOrder,
  Statement, TableSchema,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
  /// Number of records folded.
  pub records: u64,
  /// Number of distinct keys.
  pub keys: usize,
  /// Local export file.
  pub output_path: PathBuf,
  /// Location the export was uploaded to.
  pub remote_path: String,
  /// Row with the lowest mean, if any.
  pub cheapest: Option<MeanRow>,
  /// Row with the highest mean, if any.
  pub most_expensive: Option<MeanRow>,
  /// When the run started.
  pub started_at: DateTime<Utc>,
  /// When the run finished.
  pub finished_at: DateTime<Utc>,
}

/// One configured run of the averaging pipeline.
pub struct Pipeline<B, Q>
where
  B: BulkStore,
  Q: QueryStore,
{
  config: PipelineConfig,
  bulk_store: Arc<B>,
  query_store: Q,
}

impl Pipeline<LocalBulkStore, EmbeddedQueryStore<LocalBulkStore>> {
  /// Builds a pipeline over a directory-backed bulk store and an embedded
  /// query store reading from it.
  pub fn local(config: PipelineConfig) -> Self {
    let bulk_store = Arc::new(LocalBulkStore::from_config(&config.bulk_store));
    let query_store =
      EmbeddedQueryStore::new(config.query_store.clone(), Arc::clone(&bulk_store));
    Self::new(config, bulk_store, query_store)
  }
}

impl<B, Q> Pipeline<B, Q>
where
  B: BulkStore,
  Q: QueryStore,
{
  /// Builds a pipeline from its collaborators.
  pub fn new(config: PipelineConfig, bulk_store: Arc<B>, query_store: Q) -> Self {
    Self {
      config,
      bulk_store,
      query_store,
    }
  }

  /// Returns the configuration.
  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Returns the query store.
  pub fn query_store(&self) -> &Q {
    &self.query_store
  }

  /// Runs every stage in order.
  pub async fn run(&self) -> std::result::Result<PipelineReport, PipelineFailure> {
    let started_at = Utc::now();
    let result = self.run_stages(started_at).await;
    if let Err(ref failure) = result {
      error!(stage = %failure.stage, error = %failure.source, "Pipeline failed");
    }
    result
  }

  async fn run_stages(
    &self,
    started_at: DateTime<Utc>,
  ) -> std::result::Result<PipelineReport, PipelineFailure> {
    let aggregate = self.aggregate().await.stage(PipelineStage::Aggregate)?;
    let records = aggregate.records();
    let keys = aggregate.len();
    info!(stage = %PipelineStage::Aggregate, records, keys, "Stage complete");

    self.export(aggregate).await.stage(PipelineStage::Export)?;
    info!(stage = %PipelineStage::Export, path = %self.config.sink.path.display(), "Stage complete");

    self.upload().await.stage(PipelineStage::Upload)?;
    info!(stage = %PipelineStage::Upload, remote = %self.config.bulk_store.remote_path, "Stage complete");

    let (cheapest, most_expensive) = self.load_and_analyze().await?;
    info!(
      stage = %PipelineStage::Analysis,
      cheapest = ?cheapest,
      most_expensive = ?most_expensive,
      "Stage complete"
    );

    Ok(PipelineReport {
      records,
      keys,
      output_path: self.config.sink.path.clone(),
      remote_path: self.config.bulk_store.remote_path.clone(),
      cheapest,
      most_expensive,
      started_at,
      finished_at: Utc::now(),
    })
  }

  async fn aggregate(&self) -> Result<Aggregate> {
    let mut producer =
      CsvRecordProducer::from_config(self.config.source.clone()).with_name("dataset".to_string());
    StreamingAverager::new()
      .require_records(self.config.require_records)
      .fold_stream(producer.produce())
      .await
  }

  async fn export(&self, aggregate: Aggregate) -> Result<()> {
    let mut consumer =
      CsvMeanConsumer::from_config(self.config.sink.clone()).with_name("export".to_string());
    let rows = aggregate
      .into_rows()
      .into_iter()
      .map(Ok::<_, PipelineError>);
    consumer.consume(Box::pin(tokio_stream::iter(rows))).await
  }

  async fn upload(&self) -> Result<()> {
    let settings = &self.config.bulk_store;
    self
      .bulk_store
      .upload(&self.config.sink.path, &settings.remote_path, settings.overwrite)
      .await
  }

  /// Loads the uploaded file into a fresh table and queries both extremes.
  async fn load_and_analyze(
    &self,
  ) -> std::result::Result<(Option<MeanRow>, Option<MeanRow>), PipelineFailure> {
    let connection = self
      .query_store
      .connect()
      .await
      .stage(PipelineStage::Load)?;
    let mut connection = scopeguard::guard(connection, |mut connection| connection.close());

    let schema = TableSchema::from_config(&self.config.query_store);
    let setup = [
      Statement::DropTableIfExists {
        table: schema.name.clone(),
      },
      Statement::CreateTable(schema.clone()),
      Statement::LoadData {
        path: self.config.bulk_store.remote_path.clone(),
        table: schema.name.clone(),
      },
    ];
    for statement in &setup {
      connection
        .execute(statement)
        .await
        .stage(PipelineStage::Load)?;
    }
    info!(stage = %PipelineStage::Load, table = %schema.name, "Stage complete");

    let mut extremes = Vec::with_capacity(2);
    for order in [SortOrder::Ascending, SortOrder::Descending] {
      let rows = connection
        .execute(&Statement::SelectExtremal {
          schema: schema.clone(),
          order,
        })
        .await
        .stage(PipelineStage::Analysis)?;
      extremes.push(rows.into_iter().next());
    }

    let most_expensive = extremes.pop().flatten();
    let cheapest = extremes.pop().flatten();
    Ok((cheapest, most_expensive))
  }
}
