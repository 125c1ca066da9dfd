//! offline-worker entry point.
//!
//! Boots the offline caching worker and serves it as an MCP server on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use pwa_core::{AppConfig, CacheDb};
use pwa_worker::{FetchClient, FetchConfig};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(
        origin = %config.origin,
        cache = %config.cache_name(),
        db = %config.db_path.display(),
        "starting offline-worker on stdio transport"
    );

    let store = CacheDb::open(&config.db_path).await.context("failed to open cache database")?;
    let network = FetchClient::new(FetchConfig::from(&config))?;
    let state = state::HostState::start(config, store, Arc::new(network)).await?;

    let handler = handler::PwaWorkerServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
