//! sw_fetch tool implementation.
//!
//! Dispatches a request through the worker exactly as an intercepted fetch
//! would be. Requests the worker does not intercept go straight to the
//! network, the way a browser would handle them.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Network;
use swcache_client::fetch::url::canonicalize;
use swcache_core::{Destination, Error, Request, RequestMode, Response};
use swcache_worker::{FetchEvent, LifecycleHandler, ServiceWorker};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL to request.
    pub url: String,

    /// HTTP method (default: GET). Only GET is intercepted.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: Option<String>,

    /// Request destination: "document", "image", "font", "script", "style",
    /// "manifest" or "" (default).
    #[serde(default)]
    pub destination: Option<String>,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,

    /// Include the body as lossy UTF-8 text (default: true).
    #[serde(default = "default_true")]
    pub include_body: bool,
}

fn default_method() -> String {
    "GET".into()
}

fn default_true() -> bool {
    true
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchOutput {
    pub url: String,
    /// Whether the worker produced the response.
    pub intercepted: bool,
    /// Route the request classified into, if any.
    pub route: Option<String>,
    pub strategy: Option<String>,
    pub partition: Option<String>,
    pub status: u16,
    pub status_text: String,
    /// Response type: basic, cors, opaque or error.
    pub response_type: String,
    pub content_type: Option<String>,
    pub body_bytes: usize,
    pub body: Option<String>,
}

fn build_request(params: &FetchParams) -> Result<Request, McpError> {
    let url = canonicalize(&params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }

    let mut request = Request::new(params.method.trim(), url);
    if let Some(mode) = &params.mode {
        request = request.with_mode(mode.parse::<RequestMode>()?);
    }
    if let Some(destination) = &params.destination {
        request = request.with_destination(destination.parse::<Destination>()?);
    }
    if let Some(accept) = &params.accept {
        request = request.with_header("Accept", accept);
    }
    Ok(request)
}

fn fetch_output(
    worker: &ServiceWorker, request: &Request, response: &Response, intercepted: bool, include_body: bool,
) -> FetchOutput {
    let decision = if intercepted { worker.rules().classify(request) } else { None };

    FetchOutput {
        url: request.url.to_string(),
        intercepted,
        route: decision.map(|d| d.route.as_str().to_string()),
        strategy: decision.map(|d| d.strategy.as_str().to_string()),
        partition: decision.and_then(|d| d.role).map(|role| worker.partitions().name(role)),
        status: response.status,
        status_text: response.status_text.clone(),
        response_type: response.response_type.as_str().to_string(),
        content_type: response.content_type().map(String::from),
        body_bytes: response.body.len(),
        body: include_body.then(|| String::from_utf8_lossy(&response.body).into_owned()),
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    worker: &ServiceWorker, network: &dyn Network, params: FetchParams,
) -> Result<CallToolResult, McpError> {
    let request = build_request(&params)?;

    let (response, intercepted) = match worker.on_fetch(FetchEvent::new(request.clone())).await {
        Some(response) => (response, true),
        None => {
            tracing::debug!(url = %request.url, "not intercepted, passing through");
            let response = network
                .fetch(&request)
                .await
                .map_err(|e| ToolError::Network(e.to_string()))?;
            (response, false)
        }
    };

    json_result(&fetch_output(worker, &request, &response, intercepted, params.include_body))
}
