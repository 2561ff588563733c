//! Managed warehouse access
//!
//! The stage only needs one capability from the warehouse: run a load job
//! to completion. [`Warehouse`] is that seam; [`BigQueryClient`] implements
//! it against the BigQuery REST API and tests substitute their own.

pub mod auth;
pub mod bigquery;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::WarehouseConfig;
use crate::error::WarehouseError;
use crate::types::{LoadJob, LoadJobStats};

pub use bigquery::{BigQueryClient, BigQueryConnector};

/// A long-lived handle to the warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Submit `job` and wait until the warehouse reports it finished.
    async fn run_load_job(&self, job: &LoadJob) -> Result<LoadJobStats, WarehouseError>;

    /// Release the handle. Later calls fail with [`WarehouseError::Closed`].
    async fn close(&self);
}

/// Builds warehouse handles at stage setup.
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    async fn connect(
        &self,
        config: &WarehouseConfig,
    ) -> Result<Arc<dyn Warehouse>, WarehouseError>;
}
