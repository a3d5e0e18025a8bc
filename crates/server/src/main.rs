//! sw-cache server entry point.
//!
//! Boots one caching worker (install, then activate) and serves it over MCP on
//! stdio. Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchClient, FetchConfig, Network};
use swcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
#[cfg(test)]
mod testing;
mod tools;
mod worker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let db = CacheDb::open(&config.db_path).await?;
    let network: Arc<dyn Network> = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let worker = Arc::new(worker::Worker::new(db.clone(), network, &config)?);

    // A worker that fails to install stays redundant and never claims clients.
    if let Err(e) = worker.lifecycle.start().await {
        tracing::error!("worker {} did not activate: {}", config.cache_version, e);
    }

    tracing::info!("Starting sw-cache server on stdio transport");

    let handler = handler::SwCacheServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    db.close().await?;

    Ok(())
}
