//! Pipeline stages
//!
//! A [`Stage`] is driven by the runner one element at a time:
//!
//! ```text
//! setup -> process* -> teardown
//! ```
//!
//! Each worker owns its own instance, so stages hold per-worker resources
//! (such as a warehouse client) without any locking.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::WarehouseConfig;
use crate::error::{PipelineError, Result};
use crate::observer::{LoadObserver, TracingObserver};
use crate::types::{LoadJob, LoadJobConfig, LoadOutcome, LoadRequest, SkipReason};
use crate::warehouse::{BigQueryConnector, Warehouse, WarehouseConnector};

#[async_trait]
pub trait Stage: Send {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &str;

    async fn setup(&mut self) -> Result<()>;

    /// Handle one element, yielding zero or more outputs.
    async fn process(&mut self, element: Self::Input) -> Result<Vec<Self::Output>>;

    async fn teardown(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Uninitialized,
    Ready,
    Terminated,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageState::Uninitialized => "uninitialized",
            StageState::Ready => "ready",
            StageState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

enum Lifecycle {
    Uninitialized,
    Ready(Arc<dyn Warehouse>),
    Terminated,
}

/// Loads the files of each element into `{project}.{dataset}.{table_name}`
/// and forwards the element unchanged.
///
/// Load failures are reported to the observer and never fail the stage.
pub struct LoadGcsUrisToBigQuery {
    config: WarehouseConfig,
    connector: Arc<dyn WarehouseConnector>,
    observer: Arc<dyn LoadObserver>,
    job_config: LoadJobConfig,
    lifecycle: Lifecycle,
}

impl LoadGcsUrisToBigQuery {
    pub const NAME: &'static str = "LoadGcsUrisToBigQuery";

    /// Stage backed by BigQuery, logging through `tracing`.
    pub fn new(config: WarehouseConfig) -> Self {
        Self::with_parts(config, Arc::new(BigQueryConnector), Arc::new(TracingObserver))
    }

    pub fn with_parts(
        config: WarehouseConfig,
        connector: Arc<dyn WarehouseConnector>,
        observer: Arc<dyn LoadObserver>,
    ) -> Self {
        Self {
            config,
            connector,
            observer,
            job_config: LoadJobConfig::APPEND_PARQUET,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    pub fn state(&self) -> StageState {
        match self.lifecycle {
            Lifecycle::Uninitialized => StageState::Uninitialized,
            Lifecycle::Ready(_) => StageState::Ready,
            Lifecycle::Terminated => StageState::Terminated,
        }
    }

    fn not_ready(&self) -> PipelineError {
        PipelineError::StageNotReady {
            stage: Self::NAME.to_string(),
            state: self.state().to_string(),
        }
    }

    /// Decide and carry out the load for one element without reporting it.
    ///
    /// Returns the element untouched alongside what happened to it. Only a
    /// stage that is not ready produces an `Err`.
    pub async fn load(&self, element: LoadRequest) -> Result<(LoadRequest, LoadOutcome)> {
        let warehouse = match &self.lifecycle {
            Lifecycle::Ready(warehouse) => warehouse,
            _ => return Err(self.not_ready()),
        };

        if element.file_uris.is_empty() {
            return Ok((element, LoadOutcome::Skipped(SkipReason::NoFileUris)));
        }
        if element.table_name.is_empty() {
            return Ok((element, LoadOutcome::Skipped(SkipReason::NoTable)));
        }

        let job = LoadJob {
            source_uris: element.file_uris.clone(),
            destination: self.config.table(&element.table_name),
            config: self.job_config,
        };

        let outcome = match warehouse.run_load_job(&job).await {
            Ok(stats) => LoadOutcome::Loaded {
                destination: job.destination,
                stats,
            },
            Err(err) => LoadOutcome::Failed {
                destination: job.destination,
                error: format!("{:#}", anyhow::Error::new(err)),
            },
        };

        Ok((element, outcome))
    }
}

#[async_trait]
impl Stage for LoadGcsUrisToBigQuery {
    type Input = LoadRequest;
    type Output = LoadRequest;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn setup(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Uninitialized => {
                let warehouse = self
                    .connector
                    .connect(&self.config)
                    .await
                    .map_err(PipelineError::Setup)?;
                self.lifecycle = Lifecycle::Ready(warehouse);
                debug!(
                    stage = Self::NAME,
                    project = %self.config.project,
                    location = %self.config.location,
                    "Stage ready"
                );
                Ok(())
            },
            Lifecycle::Ready(_) => Ok(()),
            Lifecycle::Terminated => Err(self.not_ready()),
        }
    }

    async fn process(&mut self, element: LoadRequest) -> Result<Vec<LoadRequest>> {
        let (element, outcome) = self.load(element).await?;
        self.observer.observe(&element, &outcome);
        Ok(vec![element])
    }

    async fn teardown(&mut self) -> Result<()> {
        let previous = std::mem::replace(&mut self.lifecycle, Lifecycle::Terminated);
        if let Lifecycle::Ready(warehouse) = previous {
            warehouse.close().await;
            debug!(stage = Self::NAME, "Stage terminated");
        }
        Ok(())
    }
}
