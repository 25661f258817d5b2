//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_client::Network;
use swcache_core::CacheStore;
use swcache_worker::ServiceWorker;

use crate::host::ProcessHost;
use crate::tools::cache::{CacheGetParams, CacheKeysParams, CachePurgeParams, get_impl, keys_impl, purge_impl};
use crate::tools::fetch::{FetchParams, fetch_impl};
use crate::tools::lifecycle::{MessageParams, activate_impl, install_impl, message_impl};

/// The main MCP server handler for sw-host.
#[derive(Clone)]
pub struct SwHostServer {
    worker: Arc<ServiceWorker>,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    host: Arc<ProcessHost>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwHostServer {
    /// Create a new server handler around a constructed worker.
    pub fn new(
        worker: Arc<ServiceWorker>, store: Arc<dyn CacheStore>, network: Arc<dyn Network>, host: Arc<ProcessHost>,
    ) -> Self {
        Self { worker, store, network, host, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Install the worker: precache the app shell for the configured generation. Activates immediately after a successful install."
    )]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker, &self.host).await
    }

    #[tool(description = "Activate the installed worker: delete cache partitions of other generations and start intercepting.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Dispatch a request through the worker.
    ///
    /// Reports the route, strategy and partition the worker picked alongside the response.
    #[tool(
        description = "Fetch a URL through the caching worker. Returns status, headers summary, body, and which route/strategy/partition handled it."
    )]
    async fn sw_fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, self.network.as_ref(), params.0).await
    }

    #[tool(description = "Post a message to the worker. \"SKIP_WAITING\" activates a waiting worker immediately.")]
    async fn sw_message(&self, params: Parameters<MessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, &self.host, params.0).await
    }

    #[tool(description = "Get metadata for one cached response by partition and URL.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.store.as_ref(), params.0).await
    }

    #[tool(description = "List cache partitions with entry counts, or the keys of one partition oldest first.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(self.store.as_ref(), self.worker.partitions(), params.0).await
    }

    #[tool(description = "Delete a partition, trim it to max_entries, or delete every partition of other generations.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.store.as_ref(), self.worker.partitions(), params.0).await
    }
}

impl ServerHandler for SwHostServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sw-host".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
