//! gbq-pipeline - load Parquet files from Cloud Storage into BigQuery

use anyhow::{Context, Result};
use clap::Parser;
use gbq_common::logging::{init_logging, LogConfig, LogLevel};
use gbq_pipeline::{
    default_elements, BigQueryConnector, LoadGcsUrisToBigQuery, LoadObserver, LoadRequest, Pipeline,
    PipelineOptions, RecordingObserver, TracingObserver, WarehouseConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "gbq-pipeline")]
#[command(author, version, about = "Load Parquet files from Cloud Storage into BigQuery tables")]
struct Cli {
    /// File to load (gs://bucket/object); repeat for several files
    #[arg(short, long = "uri", value_name = "URI", conflicts_with = "elements")]
    uris: Vec<String>,

    /// Destination table inside the configured dataset
    #[arg(short, long, conflicts_with = "elements")]
    table: Option<String>,

    /// JSON file holding an array of {"file_uris": [...], "table_name": "..."}
    #[arg(short, long, value_name = "FILE")]
    elements: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = gbq_pipeline::pipeline::DEFAULT_PARALLELISM)]
    parallelism: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn elements(&self) -> Result<Vec<LoadRequest>> {
        if let Some(path) = &self.elements {
            return read_elements(path);
        }
        if !self.uris.is_empty() || self.table.is_some() {
            return Ok(vec![LoadRequest::new(
                self.uris.iter().cloned(),
                self.table.clone().unwrap_or_default(),
            )]);
        }
        Ok(default_elements())
    }
}

fn read_elements(path: &Path) -> Result<Vec<LoadRequest>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read elements file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid elements file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if args.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .log_file_prefix("gbq-pipeline")
        .filter_directives("hyper=warn,reqwest=warn")
        .build();
    let _guard = init_logging(&LogConfig::from_env_or(log_config)?)?;

    let elements = args.elements()?;
    let pipeline = Pipeline::new(PipelineOptions {
        parallelism: args.parallelism,
    })?;
    let config = WarehouseConfig::from_env()?;
    debug!(?config, "Warehouse configuration");

    let recorder = RecordingObserver::new();
    let observer: Arc<dyn LoadObserver> = Arc::new((TracingObserver, recorder.clone()));

    info!(
        elements = elements.len(),
        dataset = %config.dataset_fq(),
        "Running load pipeline"
    );
    let forwarded = pipeline
        .run(elements, || {
            LoadGcsUrisToBigQuery::with_parts(
                config.clone(),
                Arc::new(BigQueryConnector),
                observer.clone(),
            )
        })
        .await?;

    let counts = recorder.counts();
    println!(
        "Processed {} elements: {} loaded, {} skipped, {} failed",
        forwarded.len(),
        counts.loaded,
        counts.skipped,
        counts.failed
    );

    Ok(())
}
