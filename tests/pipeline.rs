use futures::StreamExt;
use price_averages::consumers::CsvMeanConsumer;
use price_averages::producers::CsvRecordProducer;
use price_averages::{
  Consumer, MeanRow, Pipeline, PipelineConfig, PipelineError, PipelineStage, Producer, Record,
  StreamingAverager,
};
use std::collections::HashMap;
use tempfile::TempDir;

fn write_dataset(dir: &TempDir, rows: &[(&str, &str)]) -> std::path::PathBuf {
  let path = dir.path().join("data.csv");
  let mut content = String::from("Make,Model,MSRP\n");
  for (make, msrp) in rows {
    content.push_str(&format!("{},model,{}\n", make, msrp));
  }
  std::fs::write(&path, content).unwrap();
  path
}

#[tokio::test]
async fn test_producer_averager_consumer() {
  let dir = TempDir::new().unwrap();
  let source = write_dataset(
    &dir,
    &[("A", "10"), ("A", "20"), ("B", "5"), ("C", "100"), ("C", "200"), ("C", "300")],
  );
  let sink = dir.path().join("out.csv");

  let mut producer = CsvRecordProducer::new(&source);
  let aggregate = StreamingAverager::new()
    .fold_stream(producer.produce())
    .await
    .unwrap();

  assert_eq!(aggregate.get("A").map(|e| (e.count, e.mean)), Some((2, 15.0)));
  assert_eq!(aggregate.get("B").map(|e| (e.count, e.mean)), Some((1, 5.0)));
  assert_eq!(aggregate.get("C").map(|e| (e.count, e.mean)), Some((3, 200.0)));

  let expected: HashMap<String, f64> = aggregate
    .iter()
    .map(|(key, entry)| (key.clone(), entry.mean))
    .collect();

  let mut consumer = CsvMeanConsumer::new(&sink);
  let rows = tokio_stream::iter(aggregate.into_rows()).map(Ok::<MeanRow, PipelineError>);
  consumer
    .consume(Box::pin(rows))
    .await
    .unwrap();

  // Re-parse the export and compare key -> mean pairs.
  let mut reader = csv::Reader::from_path(&sink).unwrap();
  let reparsed: HashMap<String, f64> = reader
    .deserialize::<MeanRow>()
    .map(|row| row.unwrap())
    .map(|row| (row.key, row.mean))
    .collect();

  assert_eq!(reparsed, expected);
}

#[tokio::test]
async fn test_producer_yields_rows_in_file_order() {
  let dir = TempDir::new().unwrap();
  let source = write_dataset(&dir, &[("x", "1"), ("y", "2"), ("x", "3")]);

  let mut producer = CsvRecordProducer::new(&source);
  let records: Vec<Record> = producer
    .produce()
    .map(|record| record.unwrap())
    .collect()
    .await;

  assert_eq!(
    records,
    vec![
      Record::new("x", 1.0),
      Record::new("y", 2.0),
      Record::new("x", 3.0),
    ]
  );
}

#[tokio::test]
async fn test_full_pipeline_from_json_config() {
  let dir = TempDir::new().unwrap();
  let source = write_dataset(
    &dir,
    &[("Lada", "8000"), ("Porsche", "120000"), ("Lada", "9000"), ("Kia", "20000")],
  );

  let config_json = serde_json::json!({
    "source": { "path": source },
    "sink": { "path": dir.path().join("means.csv"), "header": ["Make", "MSRP"] },
    "bulk_store": { "root": dir.path().join("store"), "remote_path": "/warehouse/means.csv" },
    "query_store": { "table": "msrp_by_make" }
  });
  let config_path = dir.path().join("config.json");
  std::fs::write(&config_path, config_json.to_string()).unwrap();

  let config = PipelineConfig::from_json_file(&config_path).unwrap();
  let pipeline = Pipeline::local(config);
  let report = pipeline.run().await.unwrap();

  assert_eq!(report.records, 4);
  assert_eq!(report.keys, 3);
  assert_eq!(report.remote_path, "/warehouse/means.csv");
  assert_eq!(report.cheapest, Some(MeanRow::new("Lada", 8500.0)));
  assert_eq!(report.most_expensive, Some(MeanRow::new("Porsche", 120000.0)));

  let exported = std::fs::read_to_string(dir.path().join("means.csv")).unwrap();
  assert!(exported.starts_with("Make,MSRP\n"));
  assert_eq!(pipeline.query_store().row_count("msrp_by_make"), Some(4));
}

#[tokio::test]
async fn test_full_pipeline_aborts_on_bad_row() {
  let dir = TempDir::new().unwrap();
  let source = write_dataset(&dir, &[("A", "1"), ("B", "two"), ("C", "3")]);
  let config = PipelineConfig::default()
    .with_source_path(source)
    .with_sink_path(dir.path().join("out.csv"))
    .with_bulk_store_root(dir.path().join("store"));

  let failure = Pipeline::local(config).run().await.unwrap_err();

  assert_eq!(failure.stage, PipelineStage::Aggregate);
  match failure.source {
    PipelineError::MalformedRecord { line, value, .. } => {
      assert_eq!(line, 3);
      assert_eq!(value, "two");
    }
    other => panic!("Expected MalformedRecord, got {:?}", other),
  }
  assert!(!dir.path().join("out.csv").exists());
}
