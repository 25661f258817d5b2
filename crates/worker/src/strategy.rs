//! Caching strategies.
//!
//! Each strategy runs one request against one partition. Store failures
//! never fail a request: a failed lookup is a miss and a failed write is
//! logged and skipped. Network failures fall back to the cache, and when
//! both are empty the caller gets a synthetic 504.

use std::sync::Arc;
use std::time::Duration;

use swcache_client::Network;
use swcache_core::{CacheKey, CacheStore, CachedResponse, MatchOptions, Partition, Request, Response, ResponseType};
use tokio::sync::oneshot;

use crate::evict::trim_oldest;
use crate::offline::gateway_offline;
use crate::tasks::BackgroundTasks;

/// Tuning for [`Strategies::cache_first`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheFirstOptions {
    /// Entries older than this are refetched; stale entries still serve as
    /// the offline fallback.
    pub max_age: Option<Duration>,
    /// Trim the partition to this many entries after each write.
    pub ceiling: Option<usize>,
    /// Store opaque cross-origin responses too.
    pub accept_opaque: bool,
}

/// Whether `response` may be written to a partition.
pub fn is_cacheable(response: &Response, accept_opaque: bool) -> bool {
    match response.response_type {
        ResponseType::Error => false,
        ResponseType::Opaque => accept_opaque,
        ResponseType::Basic | ResponseType::Cors => response.ok(),
    }
}

/// Write an entry, logging instead of failing.
pub(crate) async fn write_entry(
    store: &dyn CacheStore, partition: &Partition, key: &CacheKey, response: &Response,
) -> bool {
    match store.put(partition, key, response).await {
        Ok(()) => {
            tracing::debug!(partition = partition.name(), key = %key, "stored response");
            true
        }
        Err(err) => {
            tracing::warn!(partition = partition.name(), key = %key, error = %err, "cache write failed");
            false
        }
    }
}

/// Query-insensitive lookup, treating store errors as misses.
pub(crate) async fn read_entry(
    store: &dyn CacheStore, partition: &Partition, key: &CacheKey,
) -> Option<CachedResponse> {
    match store.lookup(partition, key, MatchOptions::ignoring_query()).await {
        Ok(found) => found,
        Err(err) => {
            tracing::warn!(partition = partition.name(), key = %key, error = %err, "cache lookup failed");
            None
        }
    }
}

/// Strategy executor bound to a store, a network and a background task set.
#[derive(Clone)]
pub struct Strategies {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    tasks: Arc<BackgroundTasks>,
}

impl Strategies {
    pub fn new(store: Arc<dyn CacheStore>, network: Arc<dyn Network>, tasks: Arc<BackgroundTasks>) -> Self {
        Self { store, network, tasks }
    }

    /// Serve from cache; only on a miss go to the network and store the result.
    pub async fn cache_first(&self, request: &Request, partition: &Partition, options: CacheFirstOptions) -> Response {
        let key = CacheKey::from_request(request);

        let cached = read_entry(self.store.as_ref(), partition, &key).await;
        let stale = match cached {
            Some(hit) if options.max_age.is_none_or(|max_age| !hit.is_older_than(max_age)) => {
                tracing::debug!(partition = partition.name(), key = %key, "cache hit");
                return hit.response;
            }
            Some(hit) => {
                tracing::debug!(partition = partition.name(), key = %key, "cached entry past max age");
                Some(hit.response)
            }
            None => None,
        };

        match self.network.fetch(request).await {
            Ok(response) if is_cacheable(&response, options.accept_opaque) => {
                if write_entry(self.store.as_ref(), partition, &key, &response).await
                    && let Some(ceiling) = options.ceiling
                {
                    self.spawn_eviction(partition.clone(), ceiling);
                }
                response
            }
            Ok(response) => match stale {
                Some(stale) => {
                    tracing::debug!(key = %key, status = response.status, "refetch not cacheable, serving stale entry");
                    stale
                }
                None => response,
            },
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "network failed on cache miss");
                stale.unwrap_or_else(gateway_offline)
            }
        }
    }

    /// Try the network first, fall back to the partition.
    ///
    /// Returns `None` when the network fails and nothing is cached; the
    /// caller decides what the final fallback looks like.
    pub async fn network_first(&self, request: &Request, partition: &Partition) -> Option<Response> {
        let key = CacheKey::from_request(request);

        match self.network.fetch(request).await {
            Ok(response) => {
                if is_cacheable(&response, false) {
                    write_entry(self.store.as_ref(), partition, &key, &response).await;
                }
                Some(response)
            }
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "network failed, trying cache");
                read_entry(self.store.as_ref(), partition, &key).await.map(|hit| hit.response)
            }
        }
    }

    /// Answer from cache immediately while refreshing the entry in the background.
    pub async fn stale_while_revalidate(&self, request: &Request, partition: &Partition) -> Response {
        let key = CacheKey::from_request(request);
        let (tx, rx) = oneshot::channel();

        let store = self.store.clone();
        let network = self.network.clone();
        let bg_partition = partition.clone();
        let bg_key = key.clone();
        let bg_request = request.clone();
        self.tasks.spawn(async move {
            let result = match network.fetch(&bg_request).await {
                Ok(response) => {
                    if is_cacheable(&response, false) {
                        write_entry(store.as_ref(), &bg_partition, &bg_key, &response).await;
                    }
                    Some(response)
                }
                Err(err) => {
                    tracing::debug!(key = %bg_key, error = %err, "revalidation failed");
                    None
                }
            };
            // receiver is gone when the cached copy was already served
            let _ = tx.send(result);
        });

        if let Some(hit) = read_entry(self.store.as_ref(), partition, &key).await {
            tracing::debug!(partition = partition.name(), key = %key, "serving cached copy while revalidating");
            return hit.response;
        }

        match rx.await {
            Ok(Some(response)) => response,
            _ => gateway_offline(),
        }
    }

    /// Network only; never touches the cache.
    pub async fn network_only(&self, request: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "network-only request failed");
                gateway_offline()
            }
        }
    }

    fn spawn_eviction(&self, partition: Partition, ceiling: usize) {
        let store = self.store.clone();
        self.tasks.spawn(async move {
            if let Err(err) = trim_oldest(store.as_ref(), &partition, ceiling).await {
                tracing::warn!(partition = partition.name(), error = %err, "eviction failed");
            }
        });
    }
}
