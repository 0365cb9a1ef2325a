//! One-shot job runner
//!
//! Runs a single job given as a JSON envelope and returns its output.
//! Used with `--test-input` to exercise the worker without a queue.

use anyhow::{Context, Result};
use sdrelay_core::dto::job::JobEnvelope;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::service::{JobHandler, handle_isolated, into_output};

/// Parses a job envelope given on the command line
pub fn parse_test_input(raw: &str) -> Result<JobEnvelope> {
    serde_json::from_str(raw)
        .context("Test input must be a JSON job envelope such as {\"input\": {...}}")
}

/// Dispatches `job` once and returns the job output
///
/// Failures of the job itself are part of the output.
pub async fn run_job(handler: Arc<dyn JobHandler>, job: JobEnvelope) -> Value {
    info!(job_id = ?job.id, "Running test input");

    into_output(handle_isolated(handler, job.input).await)
}
