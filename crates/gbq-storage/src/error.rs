//! Object store error types

use thiserror::Error;

/// Result type alias for object store operations
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("Object not found: gs://{bucket}/{object}")]
    NotFound { bucket: String, object: String },

    #[error("Access denied to gs://{bucket}: {message}")]
    Auth { bucket: String, message: String },

    #[error("Object gs://{bucket}/{object} is not valid UTF-8 text")]
    InvalidText {
        bucket: String,
        object: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Storage request failed: {0}")]
    Request(String),

    #[error("Storage configuration error: {0}")]
    Config(#[from] gbq_common::ConfigError),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::BucketNotFound { .. }
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, StorageError::Auth { .. })
    }
}
