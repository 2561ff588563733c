//! GBQ Pipeline Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! A one-stage batch pipeline that loads Parquet files from Cloud Storage
//! into BigQuery tables.
//!
//! # Overview
//!
//! - [`LoadRequest`]: one element, `(file_uris, table_name)`
//! - [`LoadGcsUrisToBigQuery`]: the stage; one append load job per element
//! - [`Pipeline`]: runs elements through stage instances on tokio workers
//! - [`warehouse`]: the BigQuery REST client behind the [`Warehouse`] trait
//! - [`observer`]: reports each element's [`LoadOutcome`]
//!
//! Load failures never fail the pipeline. Every element is forwarded
//! unchanged and the failure is reported to the observer at error level.
//!
//! # Example
//!
//! ```no_run
//! use gbq_pipeline::{
//!     default_elements, LoadGcsUrisToBigQuery, Pipeline, PipelineOptions, WarehouseConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = WarehouseConfig::from_env()?;
//!     let pipeline = Pipeline::new(PipelineOptions::default())?;
//!
//!     let forwarded = pipeline
//!         .run(default_elements(), || LoadGcsUrisToBigQuery::new(config.clone()))
//!         .await?;
//!     println!("{} elements processed", forwarded.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod stage;
pub mod types;
pub mod warehouse;

pub use config::WarehouseConfig;
pub use error::{PipelineError, Result, WarehouseError};
pub use observer::{LoadObserver, RecordingObserver, TracingObserver};
pub use pipeline::{default_elements, Pipeline, PipelineOptions};
pub use stage::{LoadGcsUrisToBigQuery, Stage, StageState};
pub use types::{
    LoadJob, LoadJobConfig, LoadJobStats, LoadOutcome, LoadRequest, SkipReason, TableRef,
};
pub use warehouse::{BigQueryConnector, Warehouse, WarehouseConnector};
