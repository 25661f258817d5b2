//! cache_keys tool implementation.
//!
//! Lists partitions, or the entries of one partition in eviction order.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheStore, Partition, PartitionNames};

use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// List the entries of this partition instead of the partitions.
    #[serde(default)]
    pub partition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionSummary {
    pub name: String,
    pub entries: usize,
    /// Whether the partition belongs to the running generation.
    pub current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KeyEntry {
    pub method: String,
    pub url: String,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub partitions: Vec<PartitionSummary>,
    /// Entries oldest first; the first one is evicted next.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub keys: Vec<KeyEntry>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(
    store: &dyn CacheStore, names: &PartitionNames, params: CacheKeysParams,
) -> Result<CallToolResult, McpError> {
    let mut output = CacheKeysOutput::default();

    match params.partition {
        Some(name) => {
            let keys = store.keys(&Partition::new(name)).await?;
            output.keys = keys
                .into_iter()
                .map(|k| KeyEntry { method: k.method().to_string(), url: k.url().to_string() })
                .collect();
        }
        None => {
            let keep = names.keep_set();
            for name in store.partition_names().await? {
                let entries = store.keys(&Partition::new(name.clone())).await?.len();
                let current = keep.contains(&name);
                output.partitions.push(PartitionSummary { name, entries, current });
            }
        }
    }

    json_result(&output)
}
