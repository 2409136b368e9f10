// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Beacon Daemon (beacond)
//!
//! Serves the external interfaces surface (C13, §6) over HTTP and drives
//! the scan/render queues (C9) and the retention sweep in the background.

use bc_daemon::{router, spawn_queue_workers, spawn_retention_task, AppState, Config};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();

    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
        e
    })?;
    let bind_addr = config.bind_addr();

    let state = AppState::build(config).await.map_err(|e| {
        tracing::error!(error = %e, "failed to build application state");
        e
    })?;

    spawn_retention_task(state.clone(), Duration::from_secs(3600));
    spawn_queue_workers(state.clone());

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "beacond listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Matches the teacher's `signal(SignalKind::terminate())?` + `ctrl_c()`
/// select, propagating installation failures instead of panicking.
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = terminate.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = wait_for_shutdown_signal().await {
        tracing::error!(error = %e, "failed to install shutdown signal handler, shutting down immediately");
        return;
    }
    tracing::info!("shutdown signal received");
}
