//! sw-host server entry point.
//!
//! Boots a caching worker from layered configuration and exposes its
//! lifecycle and fetch events as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchConfig, HttpNetwork};
use swcache_core::{CacheDb, WorkerConfig};
use swcache_worker::ServiceWorker;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod host;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = WorkerConfig::load().context("loading configuration")?;
    let scope = config.scope_url()?;

    tracing::info!(
        scope = %scope,
        generation = %config.generation,
        db = %config.db_path.display(),
        "Starting sw-host server on stdio transport"
    );

    let store = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(HttpNetwork::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        timeout: config.timeout(),
        origin: Some(scope.origin()),
        ..Default::default()
    })?);
    let host = Arc::new(host::ProcessHost::new());
    let worker = Arc::new(ServiceWorker::new(config, store.clone(), network.clone(), host.clone())?);

    let handler = handler::SwHostServer::new(worker, store, network, host);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
