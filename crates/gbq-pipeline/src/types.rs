//! Core types for the load stage

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One pipeline element: the files to load and the table to load them into.
///
/// Either field may be empty, in which case the element is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub file_uris: Vec<String>,
    pub table_name: String,
}

impl LoadRequest {
    pub fn new<I, S>(file_uris: I, table_name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_uris: file_uris.into_iter().map(Into::into).collect(),
            table_name: table_name.into(),
        }
    }
}

impl From<(Vec<String>, String)> for LoadRequest {
    fn from((file_uris, table_name): (Vec<String>, String)) -> Self {
        Self {
            file_uris,
            table_name,
        }
    }
}

/// Destination table addressed by project, dataset and table id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    WriteAppend,
    WriteTruncate,
    WriteEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    CreateIfNeeded,
    CreateNever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    Parquet,
    Avro,
    Orc,
    Csv,
    NewlineDelimitedJson,
}

/// Options of a load job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadJobConfig {
    pub write_disposition: WriteDisposition,
    pub create_disposition: CreateDisposition,
    pub source_format: SourceFormat,
}

impl LoadJobConfig {
    /// Append Parquet rows, creating the table on first load.
    pub const APPEND_PARQUET: LoadJobConfig = LoadJobConfig {
        write_disposition: WriteDisposition::WriteAppend,
        create_disposition: CreateDisposition::CreateIfNeeded,
        source_format: SourceFormat::Parquet,
    };
}

/// A fully specified load job, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub source_uris: Vec<String>,
    pub destination: TableRef,
    pub config: LoadJobConfig,
}

/// Statistics reported by a finished load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobStats {
    pub output_rows: i64,
    pub started: DateTime<Utc>,
    pub ended: DateTime<Utc>,
}

impl LoadJobStats {
    pub fn took(&self) -> Duration {
        self.ended - self.started
    }

    /// Elapsed time in whole seconds.
    pub fn took_secs(&self) -> i64 {
        self.took().num_seconds()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoFileUris,
    NoTable,
}

/// What happened to one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Skipped(SkipReason),
    Loaded {
        destination: TableRef,
        stats: LoadJobStats,
    },
    Failed {
        destination: TableRef,
        error: String,
    },
}

impl LoadOutcome {
    pub fn severity(&self) -> tracing::Level {
        match self {
            LoadOutcome::Skipped(_) | LoadOutcome::Loaded { .. } => tracing::Level::INFO,
            LoadOutcome::Failed { .. } => tracing::Level::ERROR,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, LoadOutcome::Failed { .. })
    }
}
