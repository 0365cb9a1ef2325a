//! Run API Handlers

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use sdrelay_core::dto::job::{JobEnvelope, RunSyncResponse};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::service::{JobHandler, handle_isolated, into_outcome};

/// POST /runsync
/// Run a job and wait for its result
pub async fn run_sync(
    State(handler): State<Arc<dyn JobHandler>>,
    payload: Result<Json<JobEnvelope>, JsonRejection>,
) -> ApiResult<Json<RunSyncResponse>> {
    let Json(job) = payload?;
    let id = job
        .id
        .unwrap_or_else(|| format!("sync-{}", uuid::Uuid::new_v4()));

    tracing::info!("Running job {}", id);

    let outcome = into_outcome(handle_isolated(handler, job.input).await);

    Ok(Json(RunSyncResponse::from_outcome(id, outcome)))
}
