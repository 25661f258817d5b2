//! cache_purge tool implementation.
//!
//! Purges a whole partition, trims one to a size, or drops every partition
//! outside the running generation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheStore, Error, Partition, PartitionNames};
use swcache_worker::evict::trim_oldest;
use swcache_worker::lifecycle::purge_stale_partitions;

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Partition to purge. Deleted entirely unless `max_entries` is set.
    #[serde(default)]
    pub partition: Option<String>,

    /// Keep only the newest N entries of `partition`.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Delete every partition not belonging to the running generation.
    #[serde(default)]
    pub stale_generations: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted by trimming.
    pub deleted_entries: u64,
    /// Partitions deleted outright.
    pub deleted_partitions: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(
    store: &dyn CacheStore, names: &PartitionNames, params: CachePurgeParams,
) -> Result<CallToolResult, McpError> {
    if params.partition.is_none() && !params.stale_generations {
        return Err(Error::InvalidInput("At least one of partition or stale_generations must be specified".to_string())
            .into());
    }
    if params.max_entries.is_some() && params.partition.is_none() {
        return Err(Error::InvalidInput("max_entries requires partition".to_string()).into());
    }

    let mut output = CachePurgeOutput { deleted_entries: 0, deleted_partitions: Vec::new() };

    if let Some(name) = params.partition {
        match params.max_entries {
            Some(max_entries) => {
                let partition = Partition::new(name);
                while trim_oldest(store, &partition, max_entries).await?.is_some() {
                    output.deleted_entries += 1;
                }
            }
            None => {
                if store.delete_partition(&name).await? {
                    output.deleted_partitions.push(name);
                }
            }
        }
    }

    if params.stale_generations {
        let (deleted, _) = purge_stale_partitions(store, &names.keep_set()).await?;
        output.deleted_partitions.extend(deleted);
    }

    tracing::info!(
        entries = output.deleted_entries,
        partitions = output.deleted_partitions.len(),
        "cache purged"
    );
    json_result(&output)
}
