//! Dispatch service
//!
//! Routes one job to one WebUI call and normalizes the result. Failures
//! are returned as values: a job never brings the worker down.

use async_trait::async_trait;
use sdrelay_client::{ClientError, WebUiClient};
use sdrelay_core::domain::job::JobInput;
use sdrelay_core::domain::operation::Operation;
use sdrelay_core::dto::job::JobOutcome;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, debug, info_span, warn};

/// Result of dispatching one job
pub type DispatchResult = Result<Value, DispatchError>;

/// Why a job produced no downstream body
///
/// The rendered messages are part of the job output contract.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The `api` tag names no known operation; nothing was sent
    #[error("Unsupported API endpoint: {0}")]
    Unsupported(String),

    /// The call never produced a usable response
    #[error("API request failed: {0}")]
    Request(ClientError),

    /// The WebUI answered with a body that is not JSON
    #[error("Handler error: invalid JSON in downstream response: {0}")]
    InvalidResponse(#[source] serde_json::Error),

    /// Anything else
    #[error("Handler error: {0}")]
    Handler(String),
}

impl DispatchError {
    /// The `{"error": ...}` object returned to the caller
    pub fn to_error_object(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

impl From<ClientError> for DispatchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Parse(e) => DispatchError::InvalidResponse(e),
            err if err.is_transport() => DispatchError::Request(err),
            other => DispatchError::Handler(other.to_string()),
        }
    }
}

/// Flattens a dispatch result into the JSON handed back to the caller
pub fn into_output(result: DispatchResult) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => e.to_error_object(),
    }
}

/// Converts a dispatch result into what is reported to the job queue
pub fn into_outcome(result: DispatchResult) -> JobOutcome {
    match result {
        Ok(value) => JobOutcome::Output(value),
        Err(e) => JobOutcome::Error(e.to_string()),
    }
}

/// Runs a job on its own task so that a panic becomes a handler error
pub async fn handle_isolated(handler: Arc<dyn JobHandler>, input: Value) -> DispatchResult {
    match tokio::spawn(async move { handler.handle(input).await }).await {
        Ok(result) => result,
        Err(e) => Err(DispatchError::Handler(format!("dispatch task failed: {}", e))),
    }
}

/// Handles a single job input
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Runs the job described by `input`
    ///
    /// `input` is the raw `input` field of the job envelope.
    async fn handle(&self, input: Value) -> DispatchResult;
}

/// Standard handler: forwards jobs to the WebUI
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: WebUiClient,
}

impl Dispatcher {
    /// Creates a dispatcher around a ready-to-use client
    pub fn new(client: WebUiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &WebUiClient {
        &self.client
    }

    /// Dispatches a parsed job input
    pub async fn dispatch(&self, input: &JobInput) -> DispatchResult {
        let operation = input.operation().map_err(DispatchError::Unsupported)?;
        let params = operation.forwards_params().then(|| input.params());

        let response = self.client.execute(operation, params.as_ref()).await?;
        debug!(status = response.status, bytes = response.body.len(), "WebUI responded");

        if operation == Operation::SetOptions && response.is_empty() {
            return Ok(json!({ "status": "success" }));
        }

        response.json().map_err(DispatchError::InvalidResponse)
    }
}

#[async_trait]
impl JobHandler for Dispatcher {
    async fn handle(&self, input: Value) -> DispatchResult {
        let input =
            JobInput::from_value(input).map_err(|e| DispatchError::Handler(e.to_string()))?;
        let span = info_span!("dispatch", api = %input.tag());

        let result = self.dispatch(&input).instrument(span.clone()).await;
        if let Err(e) = &result {
            span.in_scope(|| warn!(error = %e, "Job failed"));
        }
        result
    }
}
