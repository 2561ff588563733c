//! Pipeline runner
//!
//! Elements are dealt round-robin to `parallelism` workers. Every worker is
//! a tokio task that owns one stage instance built by the factory and runs
//! it through its whole lifecycle.

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::stage::Stage;
use crate::types::LoadRequest;

/// Worker count used when none is given.
pub const DEFAULT_PARALLELISM: usize = 1;

/// File loaded by the default pipeline definition.
pub const DEFAULT_SAMPLE_URI: &str = "gs://my_data_files/sample.parquet";

/// Table the default pipeline definition loads into.
pub const DEFAULT_SAMPLE_TABLE: &str = "sample";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub parallelism: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(PipelineError::Options(
                "parallelism must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// The element set used when the caller supplies none.
pub fn default_elements() -> Vec<LoadRequest> {
    vec![LoadRequest::new([DEFAULT_SAMPLE_URI], DEFAULT_SAMPLE_TABLE)]
}

pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Run every element through a stage and collect what the stages yield.
    ///
    /// Output order is unspecified. The first setup, process or teardown
    /// error of any worker fails the run once all workers have stopped.
    #[instrument(
        skip_all,
        fields(elements = elements.len(), parallelism = self.options.parallelism)
    )]
    pub async fn run<S, F>(&self, elements: Vec<S::Input>, factory: F) -> Result<Vec<S::Output>>
    where
        S: Stage + 'static,
        F: Fn() -> S,
    {
        let partitions = partition(elements, self.options.parallelism);
        info!(workers = partitions.len(), "Starting pipeline");

        let mut workers = JoinSet::new();
        for (worker, elements) in partitions.into_iter().enumerate() {
            let stage = factory();
            workers.spawn(async move { (worker, run_worker(worker, stage, elements).await) });
        }

        let mut outputs = Vec::new();
        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let failure = match joined {
                Ok((_, Ok(yielded))) => {
                    outputs.extend(yielded);
                    continue;
                },
                Ok((worker, Err(err))) => {
                    warn!(worker, error = %err, "Worker failed");
                    err
                },
                Err(join_err) => PipelineError::Worker(join_err.to_string()),
            };
            first_error.get_or_insert(failure);
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!(outputs = outputs.len(), "Pipeline finished");
                Ok(outputs)
            },
        }
    }
}

async fn run_worker<S: Stage>(
    worker: usize,
    mut stage: S,
    elements: Vec<S::Input>,
) -> Result<Vec<S::Output>> {
    debug!(worker, stage = stage.name(), elements = elements.len(), "Worker starting");

    let mut outputs = Vec::with_capacity(elements.len());
    let mut result = stage.setup().await;
    if result.is_ok() {
        for element in elements {
            match stage.process(element).await {
                Ok(yielded) => outputs.extend(yielded),
                Err(err) => {
                    result = Err(err);
                    break;
                },
            }
        }
    }

    let teardown = stage.teardown().await;
    result?;
    teardown?;

    debug!(worker, outputs = outputs.len(), "Worker finished");
    Ok(outputs)
}

/// Deal `elements` round-robin into at most `workers` non-empty groups.
fn partition<T>(elements: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let count = workers.min(elements.len());
    let mut groups: Vec<Vec<T>> = (0..count).map(|_| Vec::new()).collect();
    for (i, element) in elements.into_iter().enumerate() {
        groups[i % count].push(element);
    }
    groups
}
