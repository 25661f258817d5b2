//! Oldest-first bound for a partition.

use swcache_core::{CacheKey, CacheStore, Error, Partition};

/// If `partition` holds more than `ceiling` entries, delete the first
/// enumerated one.
///
/// Deletes at most one entry per call. The store enumerates keys in
/// insertion order, so this approximates FIFO; concurrent writers can push
/// the count past the ceiling until the next call.
pub async fn trim_oldest(
    store: &dyn CacheStore, partition: &Partition, ceiling: usize,
) -> Result<Option<CacheKey>, Error> {
    let keys = store.keys(partition).await?;
    if keys.len() <= ceiling {
        return Ok(None);
    }

    let oldest = keys.into_iter().next();
    if let Some(key) = &oldest {
        store.delete(partition, key).await?;
        tracing::debug!(partition = partition.name(), key = %key, ceiling, "evicted oldest entry");
    }
    Ok(oldest)
}
