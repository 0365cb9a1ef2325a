//! Local API liveness
//!
//! The server only starts once the readiness gate has seen the WebUI, so
//! answering at all means jobs can be dispatched.

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
