//! Standalone AIP registry daemon.
//!
//! Serves the registry REST surface on `PORT` (default 4100) until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use aip_registry::{RateLimitConfig, RegistryServer, RegistryStore};
use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let port = match std::env::var("PORT") {
        Ok(raw) => raw.parse::<u16>().context("PORT must be a port number")?,
        Err(_) => 4100,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let store = Arc::new(RegistryStore::new());
    let handle = RegistryServer::new(store, RateLimitConfig::default())
        .bind(addr)
        .context("failed to bind registry")?;
    info!(addr = %handle.local_addr(), "AIP registry running");

    tokio::signal::ctrl_c().await.context("signal handler")?;
    info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
