//! The cache storage capability.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::hash::CacheKey;
use crate::Error;
use crate::http::Response;

/// Handle to a named partition, obtained from [`CacheStore::open`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    name: String,
}

impl Partition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Lookup options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare URLs with their query strings removed.
    pub ignore_query: bool,
}

impl MatchOptions {
    pub fn ignoring_query() -> Self {
        Self { ignore_query: true }
    }
}

/// A stored response together with the key and time it was written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Key of the stored entry; with `ignore_query` this can differ from the lookup key.
    pub key: CacheKey,
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn age(&self) -> Duration {
        Utc::now() - self.stored_at
    }

    pub fn is_older_than(&self, max_age: std::time::Duration) -> bool {
        match Duration::from_std(max_age) {
            Ok(max_age) => self.age() > max_age,
            Err(_) => false,
        }
    }
}

/// Async key-value store grouped into named partitions.
///
/// Writing into a partition that does not exist creates it. `keys` returns
/// entries in insertion order; an overwrite counts as a fresh insertion.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a partition, creating it if absent.
    async fn open(&self, name: &str) -> Result<Partition, Error>;

    /// Find the first entry matching `key`.
    async fn lookup(
        &self, partition: &Partition, key: &CacheKey, options: MatchOptions,
    ) -> Result<Option<CachedResponse>, Error>;

    /// Insert or overwrite the entry for `key`.
    async fn put(&self, partition: &Partition, key: &CacheKey, response: &Response) -> Result<(), Error>;

    /// Delete the entry for `key`. Returns whether an entry was removed.
    async fn delete(&self, partition: &Partition, key: &CacheKey) -> Result<bool, Error>;

    /// Keys in the partition, oldest first.
    async fn keys(&self, partition: &Partition) -> Result<Vec<CacheKey>, Error>;

    /// Names of every existing partition, in creation order.
    async fn partition_names(&self) -> Result<Vec<String>, Error>;

    /// Drop a partition and all of its entries.
    async fn delete_partition(&self, name: &str) -> Result<bool, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(stored_at: DateTime<Utc>) -> CachedResponse {
        let key = CacheKey::new("GET", url::Url::parse("https://example.com/a.png").unwrap());
        CachedResponse { key, response: Response::new(200, "x"), stored_at }
    }

    #[test]
    fn test_cached_response_age() {
        let fresh = cached(Utc::now());
        assert!(!fresh.is_older_than(std::time::Duration::from_secs(60)));

        let old = cached(Utc::now() - Duration::days(8));
        assert!(old.is_older_than(std::time::Duration::from_secs(7 * 24 * 60 * 60)));
    }

    #[test]
    fn test_match_options() {
        assert!(!MatchOptions::default().ignore_query);
        assert!(MatchOptions::ignoring_query().ignore_query);
    }
}
