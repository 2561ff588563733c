//! Error types for the warehouse client and the pipeline runner

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures talking to BigQuery
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("BigQuery API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Load job {job_id} failed: {reason}: {message}")]
    Job {
        job_id: String,
        reason: String,
        message: String,
    },

    #[error("Unexpected response from BigQuery: {0}")]
    InvalidResponse(String),

    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    #[error("Warehouse client has been closed")]
    Closed,
}

/// Failures of the pipeline itself. Load failures never surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage '{stage}' cannot process elements while {state}")]
    StageNotReady { stage: String, state: String },

    #[error("Stage setup failed: {0}")]
    Setup(#[source] WarehouseError),

    #[error("Configuration error: {0}")]
    Config(#[from] gbq_common::ConfigError),

    #[error("Invalid pipeline options: {0}")]
    Options(String),

    #[error("Worker task panicked or was cancelled: {0}")]
    Worker(String),
}
