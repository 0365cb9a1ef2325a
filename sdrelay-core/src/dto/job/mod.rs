//! Job DTOs exchanged with job sources

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A job as delivered by a job source
///
/// `input` is kept as raw JSON so that a malformed input can be reported
/// as a job failure instead of being rejected at deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub input: Value,
}

/// Result of a job as reported back to the queue
///
/// Serializes as `{"output": ...}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Output(Value),
    Error(String),
}

impl JobOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, JobOutcome::Error(_))
    }
}

/// Final status of a synchronous run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Response body of the local `/runsync` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSyncResponse {
    pub id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSyncResponse {
    pub fn from_outcome(id: String, outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Output(output) => Self {
                id,
                status: RunStatus::Completed,
                output: Some(output),
                error: None,
            },
            JobOutcome::Error(error) => Self {
                id,
                status: RunStatus::Failed,
                output: None,
                error: Some(error),
            },
        }
    }
}
