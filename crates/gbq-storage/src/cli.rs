//! Command implementations behind the `gbq-objects` binary
//!
//! Kept in the library so they can be exercised against
//! [`MemoryObjectStore`](crate::MemoryObjectStore).

use anyhow::{Context, Result};
use futures::TryStreamExt;
use std::io::Write;
use tracing::info;

use crate::ObjectStore;

/// Print every object name in `bucket`, one per line, as pages arrive.
pub async fn list<S, W>(store: &S, bucket: &str, out: &mut W) -> Result<usize>
where
    S: ObjectStore + ?Sized,
    W: Write,
{
    let mut listing = store.list_objects(bucket);
    let mut count = 0usize;

    while let Some(name) = listing
        .try_next()
        .await
        .with_context(|| format!("Failed to list gs://{}", bucket))?
    {
        writeln!(out, "{}", name)?;
        count += 1;
    }

    info!(bucket = %bucket, count, "Listed objects");
    Ok(count)
}

/// Print the full contents of one object.
pub async fn read<S, W>(store: &S, bucket: &str, object: &str, out: &mut W) -> Result<()>
where
    S: ObjectStore + ?Sized,
    W: Write,
{
    let contents = store
        .read_object(bucket, object)
        .await
        .with_context(|| format!("Failed to read gs://{}/{}", bucket, object))?;

    writeln!(out, "{}", contents)?;
    Ok(())
}

pub async fn write<S>(store: &S, bucket: &str, object: &str, contents: &str) -> Result<()>
where
    S: ObjectStore + ?Sized,
{
    store
        .write_object(bucket, object, contents)
        .await
        .with_context(|| format!("Failed to write gs://{}/{}", bucket, object))
}
