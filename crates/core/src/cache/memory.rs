//! In-memory cache store.
//!
//! Uses a tokio RwLock over insertion-ordered vectors. Partitions and entries
//! are few enough that linear scans are fine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::hash::CacheKey;
use super::store::{CacheStore, CachedResponse, MatchOptions, Partition};
use crate::Error;
use crate::http::Response;

struct MemoryEntry {
    hash: String,
    loose_hash: String,
    cached: CachedResponse,
}

struct MemoryPartition {
    name: String,
    entries: Vec<MemoryEntry>,
}

/// Counters for store traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub lookups: usize,
    pub writes: usize,
    pub deletes: usize,
}

#[derive(Default)]
struct Counters {
    lookups: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

/// Process-local `CacheStore`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    partitions: Arc<RwLock<Vec<MemoryPartition>>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup/write/delete counts since creation.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            lookups: self.counters.lookups.load(Ordering::SeqCst),
            writes: self.counters.writes.load(Ordering::SeqCst),
            deletes: self.counters.deletes.load(Ordering::SeqCst),
        }
    }

    /// Number of entries in a partition, zero if it does not exist.
    pub async fn len(&self, name: &str) -> usize {
        let partitions = self.partitions.read().await;
        partitions
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.entries.len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").field("stats", &self.stats()).finish()
    }
}

fn find_or_create<'a>(partitions: &'a mut Vec<MemoryPartition>, name: &str) -> &'a mut MemoryPartition {
    let index = match partitions.iter().position(|p| p.name == name) {
        Some(index) => index,
        None => {
            partitions.push(MemoryPartition { name: name.to_string(), entries: Vec::new() });
            partitions.len() - 1
        }
    };
    &mut partitions[index]
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, name: &str) -> Result<Partition, Error> {
        let mut partitions = self.partitions.write().await;
        find_or_create(&mut partitions, name);
        Ok(Partition::new(name))
    }

    async fn lookup(
        &self, partition: &Partition, key: &CacheKey, options: MatchOptions,
    ) -> Result<Option<CachedResponse>, Error> {
        self.counters.lookups.fetch_add(1, Ordering::SeqCst);
        let partitions = self.partitions.read().await;
        let Some(p) = partitions.iter().find(|p| p.name == partition.name()) else {
            return Ok(None);
        };

        let found = if options.ignore_query {
            let loose = key.loose_hash();
            p.entries.iter().find(|e| e.loose_hash == loose)
        } else {
            let hash = key.hash();
            p.entries.iter().find(|e| e.hash == hash)
        };

        Ok(found.map(|e| e.cached.clone()))
    }

    async fn put(&self, partition: &Partition, key: &CacheKey, response: &Response) -> Result<(), Error> {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        let mut partitions = self.partitions.write().await;
        let p = find_or_create(&mut partitions, partition.name());
        let hash = key.hash();

        p.entries.retain(|e| e.hash != hash);
        p.entries.push(MemoryEntry {
            hash,
            loose_hash: key.loose_hash(),
            cached: CachedResponse { key: key.clone(), response: response.clone(), stored_at: Utc::now() },
        });
        Ok(())
    }

    async fn delete(&self, partition: &Partition, key: &CacheKey) -> Result<bool, Error> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        let mut partitions = self.partitions.write().await;
        let Some(p) = partitions.iter_mut().find(|p| p.name == partition.name()) else {
            return Ok(false);
        };

        let hash = key.hash();
        let before = p.entries.len();
        p.entries.retain(|e| e.hash != hash);
        Ok(p.entries.len() < before)
    }

    async fn keys(&self, partition: &Partition) -> Result<Vec<CacheKey>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .iter()
            .find(|p| p.name == partition.name())
            .map(|p| p.entries.iter().map(|e| e.cached.key.clone()).collect())
            .unwrap_or_default())
    }

    async fn partition_names(&self) -> Result<Vec<String>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions.iter().map(|p| p.name.clone()).collect())
    }

    async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let mut partitions = self.partitions.write().await;
        let before = partitions.len();
        partitions.retain(|p| p.name != name);
        Ok(partitions.len() < before)
    }
}
