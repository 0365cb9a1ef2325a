//! Local API Module
//!
//! A small HTTP server for running jobs by hand during development.
//! It accepts the same job envelope the queue delivers.

pub mod error;
pub mod health;
pub mod run;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::JobHandler;

/// Create the local API router
pub fn create_router(handler: Arc<dyn JobHandler>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/runsync", post(run::run_sync))
        // Add state and middleware
        .with_state(handler)
        .layer(TraceLayer::new_for_http())
}

/// Serve the local API until the process is stopped
pub async fn serve(addr: SocketAddr, handler: Arc<dyn JobHandler>) -> Result<()> {
    let app = create_router(handler);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind local API to {}", addr))?;

    tracing::info!("Local API listening on {}", addr);

    axum::serve(listener, app)
        .await
        .context("Local API server failed")
}
