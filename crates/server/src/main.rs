//! leumas-sw server entry point.
//!
//! Loads configuration, composes the app (storage, network transport, cache
//! worker), registers the worker and serves it over MCP stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use leumas_core::AppConfig;

mod app;
mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let app = Arc::new(app::App::bootstrap(AppConfig::load()?).await?);
    tracing::info!("starting leumas-sw for {} ({})", app.config().origin, app.config().cache_version);

    match app.start().await? {
        Some(registration) => tracing::info!("worker {} at {}", registration.state, registration.scope),
        None => tracing::warn!("worker not registered, requests pass through"),
    }

    let handler = handler::LeumasServer::new(app);
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
