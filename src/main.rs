use price_averages::config::PipelineConfig;
use price_averages::pipeline::Pipeline;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  // Optional first argument: path to a JSON configuration file.
  let config = match std::env::args().nth(1) {
    Some(path) => match PipelineConfig::from_json_file(&path) {
      Ok(config) => config,
      Err(e) => {
        error!(path = %path, error = %e, "Failed to load configuration");
        return ExitCode::FAILURE;
      }
    },
    None => PipelineConfig::default(),
  };

  let pipeline = Pipeline::local(config);
  let settings = pipeline.config();
  info!(
    source = %settings.source.path.display(),
    remote = %settings.bulk_store.remote_path,
    query_store = %settings.query_store.address(),
    "Starting pipeline"
  );

  match pipeline.run().await {
    Ok(report) => {
      match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "Failed to serialize report"),
      }
      info!(records = report.records, keys = report.keys, "Done");
      ExitCode::SUCCESS
    }
    Err(failure) => {
      eprintln!("{}", failure);
      ExitCode::FAILURE
    }
  }
}
