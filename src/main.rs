//! Presence & Relay Server - Entry Point
//!
//! Starts the TCP listener and RelayHub actor, accepting connections.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use presence_relay::{serve, Config, InMemoryDirectory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=presence_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("presence_relay=info")),
        )
        .init();

    let config = Config::from_env()?;

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Presence relay listening on {}", config.bind_addr);

    // Online status is kept in process memory
    let directory = Arc::new(InMemoryDirectory::new());

    serve(listener, config, directory).await;

    Ok(())
}
