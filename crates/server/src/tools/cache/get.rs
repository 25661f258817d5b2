//! cache_get tool implementation.
//!
//! Retrieves one cached response from a partition.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::fetch::url::canonicalize;
use swcache_core::{CacheKey, CacheStore, Error, MatchOptions, Partition};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Partition name, e.g. "app-shell-v1".
    pub partition: String,

    /// URL of the cached request.
    pub url: String,

    /// Match regardless of the query string, as the worker does.
    #[serde(default)]
    pub ignore_query: bool,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub partition: String,
    /// URL the entry was stored under.
    pub url: String,
    pub status: u16,
    pub response_type: String,
    pub content_type: Option<String>,
    pub body_bytes: usize,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
    pub age_secs: i64,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(store: &dyn CacheStore, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let key = CacheKey::new("GET", url);
    let partition = Partition::new(params.partition.clone());
    let options = if params.ignore_query { MatchOptions::ignoring_query() } else { MatchOptions::default() };

    let cached = store
        .lookup(&partition, &key, options)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{key} in {}", params.partition)))?;

    let response = &cached.response;
    let output = CacheGetOutput {
        partition: params.partition,
        url: cached.key.url().to_string(),
        status: response.status,
        response_type: response.response_type.as_str().to_string(),
        content_type: response.content_type().map(String::from),
        body_bytes: response.body.len(),
        stored_at: cached.stored_at.to_rfc3339(),
        age_secs: cached.age().num_seconds(),
    };

    json_result(&output)
}
