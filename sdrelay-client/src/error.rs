//! Error types for the sdrelay clients

use std::error::Error as StdError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the WebUI or the job queue
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connection, DNS, timeout)
    #[error("{}", error_chain(.0))]
    Transport(#[from] reqwest::Error),

    /// Every attempt allowed by the retry policy got a retryable status
    #[error("Max retries exceeded with url: {url} (too many {status} error responses)")]
    RetriesExhausted {
        /// Request URL
        url: String,
        /// Status of the last attempt
        status: u16,
    },

    /// API returned an error status code
    #[error("API error (status {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Failed to parse a response body
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ClientError {
    /// Create an API error from status code and body
    pub fn api_error(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Whether the failure happened below HTTP semantics
    ///
    /// Exhausted retries count as transport failures: the caller never got
    /// a usable response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RetriesExhausted { .. })
    }

    /// Check if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

/// Renders an error followed by its sources
///
/// reqwest keeps the interesting part (connection refused, timed out) in
/// the source chain rather than in its own message.
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
