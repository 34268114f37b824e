//! # proxima-server
//!
//! HTTP and WebSocket server for the proxima proximity telemetry service.
//!
//! This binary provides:
//! - REST endpoints for scanner and notifier producers
//! - A WebSocket channel that pushes state changes to viewers
//! - Periodic stale sweeps, health checks and stats broadcasts
//! - OpenAPI documentation via Swagger UI
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package proxima-server
//!
//! # With an explicit config file and port override
//! PROXIMA_CONFIG=./proxima.toml PROXIMA__SERVER__PORT=8080 ./proxima-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use proxima_core::{Config, SystemClock};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use proxima_server::{api, logging, scheduler, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(None).context("failed to load configuration")?;

    logging::init(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting proxima-server");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let shared = state::new_state(config, Arc::new(SystemClock));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = scheduler::spawn(shared.clone(), shutdown_rx);

    let app = api::create_router(shared.clone());
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Listening on {}", addr);

    let viewers = shared.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open WebSocket connections would otherwise hold the server up.
            viewers.write().await.shutdown();
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = maintenance.await {
        tracing::warn!(error = %err, "Maintenance loop ended abnormally");
    }

    info!("proxima-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
