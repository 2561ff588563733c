//! Warehouse configuration
//!
//! Project, location and dataset are fixed per deployment and injected into
//! the stage when it is constructed. Everything can be overridden through
//! the environment (or a `.env` file).

use gbq_common::{env, ConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::types::TableRef;

// ============================================================================
// Warehouse Configuration Constants
// ============================================================================

/// Default GCP project owning the dataset and running the load jobs.
pub const DEFAULT_GCP_PROJECT: &str = "ansible-eg";

/// Default location load jobs run in.
pub const DEFAULT_GCP_REGION: &str = "us-west1";

/// Default BigQuery dataset receiving the tables.
pub const DEFAULT_GBQ_DATASET: &str = "ansible_eg";

/// BigQuery REST API root.
pub const DEFAULT_API_BASE_URL: &str = "https://bigquery.googleapis.com";

/// Token endpoint of the GCE/GKE metadata server.
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Delay between job status polls in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

#[derive(Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub project: String,
    pub location: String,
    pub dataset: String,
    pub api_base_url: String,
    /// Static OAuth bearer token. When absent, tokens come from the
    /// metadata server.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub metadata_token_url: String,
    pub http_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("project", &self.project)
            .field("location", &self.location)
            .field("dataset", &self.dataset)
            .field("api_base_url", &self.api_base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("metadata_token_url", &self.metadata_token_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project: DEFAULT_GCP_PROJECT.to_string(),
            location: DEFAULT_GCP_REGION.to_string(),
            dataset: DEFAULT_GBQ_DATASET.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            access_token: None,
            metadata_token_url: DEFAULT_METADATA_TOKEN_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WarehouseConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> gbq_common::Result<Self> {
        env::load_dotenv();

        let config = Self {
            project: env::string_or("GCP_PROJECT", DEFAULT_GCP_PROJECT),
            location: env::string_or("GCP_REGION", DEFAULT_GCP_REGION),
            dataset: env::string_or("GBQ_DATASET", DEFAULT_GBQ_DATASET),
            api_base_url: env::string_or("GBQ_API_BASE_URL", DEFAULT_API_BASE_URL),
            access_token: env::optional("GBQ_ACCESS_TOKEN"),
            metadata_token_url: env::string_or("GBQ_METADATA_URL", DEFAULT_METADATA_TOKEN_URL),
            http_timeout_secs: env::parse_or("GBQ_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            poll_interval_ms: env::parse_or("GBQ_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> gbq_common::Result<()> {
        for (key, value) in [
            ("GCP_PROJECT", &self.project),
            ("GCP_REGION", &self.location),
            ("GBQ_DATASET", &self.dataset),
            ("GBQ_API_BASE_URL", &self.api_base_url),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Missing(key.to_string()));
            }
        }

        if self.dataset.contains('.') {
            return Err(ConfigError::InvalidValue {
                key: "GBQ_DATASET".to_string(),
                value: self.dataset.clone(),
                reason: "dataset ids cannot contain '.'".to_string(),
            });
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::invalid("GBQ_HTTP_TIMEOUT_SECS must be greater than 0"));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("GBQ_POLL_INTERVAL_MS must be greater than 0"));
        }

        Ok(())
    }

    /// `{project}.{dataset}`
    pub fn dataset_fq(&self) -> String {
        format!("{}.{}", self.project, self.dataset)
    }

    /// Destination for `table` inside the configured dataset.
    pub fn table(&self, table: &str) -> TableRef {
        TableRef {
            project_id: self.project.clone(),
            dataset_id: self.dataset.clone(),
            table_id: table.to_string(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
