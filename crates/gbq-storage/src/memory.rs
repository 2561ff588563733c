//! In-process object store
//!
//! Buckets must be created before use, mirroring the managed service: reads,
//! writes and listings against an unknown bucket fail with `BucketNotFound`.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Result, StorageError};
use crate::ObjectStore;

type Buckets = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<Buckets>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bucket. Creating an existing bucket is a no-op.
    pub async fn create_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
    }

    /// Convenience for tests: a store holding one bucket with `objects`.
    pub async fn with_objects<I, K, V>(bucket: &str, objects: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        store.buckets.write().await.insert(
            bucket.to_string(),
            objects
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        store
    }

    fn missing_bucket(bucket: &str) -> StorageError {
        StorageError::BucketNotFound {
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn list_objects<'a>(&'a self, bucket: &'a str) -> BoxStream<'a, Result<String>> {
        // The snapshot is taken on first poll, not when the stream is built.
        stream::once(async move {
            let buckets = self.buckets.read().await;
            match buckets.get(bucket) {
                Some(objects) => objects.keys().cloned().map(Ok).collect::<Vec<_>>(),
                None => vec![Err(Self::missing_bucket(bucket))],
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }

    async fn read_object(&self, bucket: &str, object: &str) -> Result<String> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Self::missing_bucket(bucket))?;

        objects
            .get(object)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            })
    }

    async fn write_object(&self, bucket: &str, object: &str, contents: &str) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::missing_bucket(bucket))?;

        objects.insert(object.to_string(), contents.to_string());
        Ok(())
    }
}
