//! GBQ Storage Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Text-object access to Cloud Storage buckets.
//!
//! # Overview
//!
//! - [`ObjectStore`]: list, read and write named objects in a bucket
//! - [`GcsObjectStore`]: Cloud Storage through its S3-interoperable XML API
//! - [`MemoryObjectStore`]: in-process buckets for tests and dry runs
//!
//! Listing is lazy: [`ObjectStore::list_objects`] returns a stream and no
//! request is issued until it is polled. Each page is fetched only after
//! the previous one has been consumed.
//!
//! # Example
//!
//! ```no_run
//! use futures::TryStreamExt;
//! use gbq_storage::{config::StorageConfig, GcsObjectStore, ObjectStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = GcsObjectStore::new(StorageConfig::from_env()?).await?;
//!     store.write_object("my_data_files", "hello.txt", "Hello world").await?;
//!     assert_eq!(store.read_object("my_data_files", "hello.txt").await?, "Hello world");
//!
//!     let names: Vec<String> = store.list_objects("my_data_files").try_collect().await?;
//!     println!("{names:?}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod gcs;
pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use error::{Result, StorageError};
pub use gcs::GcsObjectStore;
pub use memory::MemoryObjectStore;

/// Bucket used by the command line tool when none is given.
pub const DEFAULT_BUCKET: &str = "my_data_files";

/// Text-mode access to objects addressed by bucket and object name.
///
/// Errors are returned to the caller unchanged; implementations never
/// swallow a failed request.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lazily enumerate every object name in `bucket`.
    fn list_objects<'a>(&'a self, bucket: &'a str) -> BoxStream<'a, Result<String>>;

    /// Read the whole object as UTF-8 text.
    async fn read_object(&self, bucket: &str, object: &str) -> Result<String>;

    /// Write `contents` as the object, replacing any existing object.
    async fn write_object(&self, bucket: &str, object: &str, contents: &str) -> Result<()>;
}
