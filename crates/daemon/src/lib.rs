// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bc-daemon: wires every other crate's seam into a concrete `AppState`
//! (§9) and exposes the External interfaces surface (C13, §6) as an axum
//! `Router`. `beacond` (`src/main.rs`) is the thin binary that loads config,
//! builds state, and serves this router.

pub mod config;
pub mod dynamic;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::{AppState, StateError};

/// Builds the full §6 HTTP surface over a shared `AppState`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/runs", post(routes::create_run))
        .route("/api/runs/{id}", get(routes::get_run))
        .route("/api/findings/{id}/reverify", post(routes::reverify_finding))
        .route("/api/findings/{id}/reverify-attempts", get(routes::reverify_attempts))
        .route("/api/slack/actions", get(routes::slack_action_get).post(routes::slack_action_post))
        .route("/health", get(routes::health))
        .route("/ready", get(routes::ready))
        .route("/metrics", get(routes::metrics))
        .route("/admin/breaker", get(routes::admin_breaker_snapshot))
        .route("/admin/breaker/reset", post(routes::admin_breaker_reset))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Spawns the retention sweep (§6) as a background task on the given
/// interval. Detached: the daemon doesn't wait on it and it never returns.
pub fn spawn_retention_task(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        bc_engine::run_retention_loop(state.store.clone(), state.clock.clone(), state.artifact_writer.clone(), interval).await;
    });
}

/// Spawns the scan-queue and render-queue drain loops (C9, §4.9) as
/// background tasks. A `JobQueue` only accepts `enqueue`d jobs into its
/// channel; nothing runs them until `run()` is polled, so this must be
/// called once at startup for both queues before any job can complete.
pub fn spawn_queue_workers(state: Arc<AppState>) {
    let scan_queue = state.scan_queue.clone();
    tokio::spawn(async move {
        scan_queue.run().await;
    });
    let render_queue = state.render_queue.clone();
    tokio::spawn(async move {
        render_queue.run().await;
    });
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
