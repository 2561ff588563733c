//! BigQuery REST client for load jobs
//!
//! Uses the v2 jobs API:
//! - `POST /bigquery/v2/projects/{project}/jobs` to insert a load job
//! - `GET  /bigquery/v2/projects/{project}/jobs/{jobId}?location=..` to poll it
//!
//! Job ids are generated client side so a job can be polled even when the
//! insert response is lost.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::auth::TokenSource;
use super::{Warehouse, WarehouseConnector};
use crate::config::WarehouseConfig;
use crate::error::WarehouseError;
use crate::types::{LoadJob, LoadJobConfig, LoadJobStats, TableRef};

const JOB_DONE: &str = "DONE";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadConfiguration<'a> {
    source_uris: &'a [String],
    destination_table: &'a TableRef,
    #[serde(flatten)]
    options: LoadJobConfig,
}

#[derive(Debug, Serialize)]
struct JobConfiguration<'a> {
    load: LoadConfiguration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobInsert<'a> {
    job_reference: JobReference,
    configuration: JobConfiguration<'a>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    status: Option<JobStatus>,
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    error_result: Option<ErrorProto>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
    location: Option<String>,
}

/// Int64 values arrive as JSON strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatistics {
    start_time: Option<String>,
    end_time: Option<String>,
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    output_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

pub struct BigQueryClient {
    http: Client,
    config: WarehouseConfig,
    tokens: TokenSource,
    closed: AtomicBool,
}

impl BigQueryClient {
    pub fn new(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        let http = Client::builder().timeout(config.http_timeout()).build()?;

        let tokens = match &config.access_token {
            Some(token) => TokenSource::fixed(token.clone()),
            None => TokenSource::metadata(config.metadata_token_url.clone()),
        };

        info!(
            project = %config.project,
            location = %config.location,
            "BigQuery client initialized"
        );

        Ok(Self {
            http,
            config,
            tokens,
            closed: AtomicBool::new(false),
        })
    }

    fn jobs_url(&self) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/jobs",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.project
        )
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, WarehouseError> {
        let token = self.tokens.token(&self.http).await?;
        Ok(request.bearer_auth(token))
    }

    async fn insert_job(&self, job: &LoadJob, job_id: &str) -> Result<JobResource, WarehouseError> {
        let body = JobInsert {
            job_reference: JobReference {
                project_id: self.config.project.clone(),
                job_id: job_id.to_string(),
                location: Some(self.config.location.clone()),
            },
            configuration: JobConfiguration {
                load: LoadConfiguration {
                    source_uris: &job.source_uris,
                    destination_table: &job.destination,
                    options: job.config,
                },
            },
        };

        let request = self.authorized(self.http.post(self.jobs_url()).json(&body)).await?;
        parse_json(request.send().await?).await
    }

    async fn get_job(&self, job_id: &str) -> Result<JobResource, WarehouseError> {
        let url = format!("{}/{}", self.jobs_url(), job_id);
        let request = self
            .authorized(
                self.http
                    .get(url)
                    .query(&[("location", self.config.location.as_str())]),
            )
            .await?;
        parse_json(request.send().await?).await
    }

    /// Poll until the job reaches `DONE`. There is no deadline of our own.
    async fn wait_for_job(
        &self,
        job_id: &str,
        mut job: JobResource,
    ) -> Result<JobResource, WarehouseError> {
        loop {
            let state = job
                .status
                .as_ref()
                .map(|s| s.state.as_str())
                .unwrap_or("PENDING");
            if state == JOB_DONE {
                return Ok(job);
            }

            debug!(job_id = %job_id, state = %state, "Waiting for load job");
            tokio::time::sleep(self.config.poll_interval()).await;
            job = self.get_job(job_id).await?;
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    #[instrument(
        skip(self, job),
        fields(destination = %job.destination, files = job.source_uris.len())
    )]
    async fn run_load_job(&self, job: &LoadJob) -> Result<LoadJobStats, WarehouseError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WarehouseError::Closed);
        }

        let job_id = format!("gbq_load_{}", Uuid::new_v4().simple());
        let inserted = self.insert_job(job, &job_id).await?;
        debug!(job_id = %job_id, "Load job submitted");

        let finished = self.wait_for_job(&job_id, inserted).await?;
        job_stats(&job_id, &finished)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(project = %self.config.project, "BigQuery client closed");
        }
    }
}

/// Connects [`BigQueryClient`]s for the stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigQueryConnector;

#[async_trait]
impl WarehouseConnector for BigQueryConnector {
    async fn connect(
        &self,
        config: &WarehouseConfig,
    ) -> Result<Arc<dyn Warehouse>, WarehouseError> {
        Ok(Arc::new(BigQueryClient::new(config.clone())?))
    }
}

// ============================================================================
// Response handling
// ============================================================================

async fn parse_json(response: Response) -> Result<JobResource, WarehouseError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(WarehouseError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<JobResource>()
        .await
        .map_err(|e| WarehouseError::InvalidResponse(format!("job resource: {}", e)))
}

fn job_stats(job_id: &str, job: &JobResource) -> Result<LoadJobStats, WarehouseError> {
    if let Some(status) = &job.status {
        if let Some(error) = &status.error_result {
            return Err(job_error(job_id, error, &status.errors));
        }
    }

    let statistics = job
        .statistics
        .as_ref()
        .ok_or_else(|| {
            WarehouseError::InvalidResponse(format!("job {} has no statistics", job_id))
        })?;

    let output_rows = statistics
        .load
        .as_ref()
        .and_then(|load| load.output_rows.as_deref())
        .map(|rows| {
            rows.parse::<i64>()
                .map_err(|_| WarehouseError::InvalidResponse(format!("outputRows '{}'", rows)))
        })
        .transpose()?
        .unwrap_or(0);

    Ok(LoadJobStats {
        output_rows,
        started: epoch_millis(statistics.start_time.as_deref(), "startTime")?,
        ended: epoch_millis(statistics.end_time.as_deref(), "endTime")?,
    })
}

fn job_error(job_id: &str, error: &ErrorProto, details: &[ErrorProto]) -> WarehouseError {
    let mut message = error.message.clone().unwrap_or_default();
    for detail in details {
        let text = detail.message.as_deref().unwrap_or_default();
        if text.is_empty() || text == message {
            continue;
        }
        match &detail.location {
            Some(location) => message.push_str(&format!("; {} ({})", text, location)),
            None => message.push_str(&format!("; {}", text)),
        }
    }

    WarehouseError::Job {
        job_id: job_id.to_string(),
        reason: error.reason.clone().unwrap_or_else(|| "unknown".to_string()),
        message,
    }
}

fn epoch_millis(raw: Option<&str>, field: &str) -> Result<DateTime<Utc>, WarehouseError> {
    let raw = raw.ok_or_else(|| WarehouseError::InvalidResponse(format!("missing {}", field)))?;
    raw.parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .ok_or_else(|| WarehouseError::InvalidResponse(format!("{} '{}'", field, raw)))
}
