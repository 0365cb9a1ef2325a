//! WebUI API client
//!
//! Thin wrapper over the Stable Diffusion WebUI `/sdapi/v1` endpoints.
//! Request and response bodies are opaque JSON: the client only moves
//! them, applying the per-operation timeout and the retry policy.

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method};
use sdrelay_core::domain::operation::{HttpMethod, Operation};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::retry::{FailureKind, RetryPolicy, parse_retry_after};

/// Base URL of a WebUI running next to the worker
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000/sdapi/v1";

/// Endpoint polled to find out whether the WebUI is up
pub const HEALTH_PATH: &str = "/sd-models";

/// Status and raw body of a downstream response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Decodes the body as JSON
    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

/// HTTP client for the WebUI API
///
/// Cheap to clone; clones share the connection pool. Nothing in it changes
/// after construction, so one instance can serve concurrent jobs.
#[derive(Debug, Clone)]
pub struct WebUiClient {
    /// Base URL of the API (e.g., "http://127.0.0.1:3000/sdapi/v1")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Retry policy applied to every operation call
    retry: RetryPolicy,
    /// Replaces the per-operation timeout when set
    timeout: Option<Duration>,
}

impl WebUiClient {
    /// Create a new WebUI client
    ///
    /// # Example
    /// ```
    /// use sdrelay_client::{RetryPolicy, WebUiClient};
    ///
    /// let client = WebUiClient::new("http://127.0.0.1:3000/sdapi/v1", RetryPolicy::default());
    /// assert_eq!(client.health_url(), "http://127.0.0.1:3000/sdapi/v1/sd-models");
    /// ```
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self::with_client(base_url, Client::new(), retry)
    }

    /// Create a WebUI client around a preconfigured reqwest client
    pub fn with_client(base_url: impl Into<String>, client: Client, retry: RetryPolicy) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry,
            timeout: None,
        }
    }

    /// Use `timeout` for every operation call instead of the operation's own
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Timeout applied to calls of `operation`
    pub fn timeout_for(&self, operation: Operation) -> Duration {
        self.timeout.unwrap_or_else(|| operation.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn health_url(&self) -> String {
        self.url(HEALTH_PATH)
    }

    /// Perform the downstream call of `operation`
    ///
    /// `params` is sent as the JSON body when given. Any status is returned
    /// as a response; only transport failures and exhausted retries are
    /// errors.
    pub async fn execute(
        &self,
        operation: Operation,
        params: Option<&Map<String, Value>>,
    ) -> Result<ApiResponse> {
        let url = self.url(operation.path());
        debug!(operation = %operation, url = %url, "Calling WebUI");

        self.send_with_retry(operation.method(), &url, params, self.timeout_for(operation))
            .await
    }

    /// Perform the downstream call and decode its body as JSON
    pub async fn call(
        &self,
        operation: Operation,
        params: Option<&Map<String, Value>>,
    ) -> Result<Value> {
        let response = self.execute(operation, params).await?;
        Ok(response.json()?)
    }

    /// Issue a single GET against the health endpoint
    ///
    /// Returns the status of whatever answered. The retry policy does not
    /// apply here; the readiness gate has its own loop.
    pub async fn check_health(&self, timeout: Duration) -> Result<u16> {
        let response = self
            .client
            .get(self.health_url())
            .timeout(timeout)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }

    // =============================================================================
    // Retry Loop
    // =============================================================================

    async fn send_with_retry(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Map<String, Value>>,
        timeout: Duration,
    ) -> Result<ApiResponse> {
        let mut failures = 0u32;

        loop {
            let mut request = self
                .client
                .request(to_reqwest_method(method), url)
                .timeout(timeout);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if !self.retry.retries_status(method, status) {
                        let body = response.text().await?;
                        return Ok(ApiResponse { status, body });
                    }

                    failures += 1;
                    if failures > self.retry.max_retries {
                        return Err(ClientError::RetriesExhausted {
                            url: url.to_string(),
                            status,
                        });
                    }

                    let delay = response
                        .headers()
                        .get(RETRY_AFTER)
                        .filter(|_| status == 503)
                        .and_then(|value| value.to_str().ok())
                        .and_then(parse_retry_after)
                        .unwrap_or_else(|| self.retry.backoff(failures));

                    warn!(
                        url = %url,
                        status,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "WebUI returned retryable status"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let kind = classify(&e);
                    if !self.retry.retries_failure(method, kind)
                        || failures >= self.retry.max_retries
                    {
                        return Err(e.into());
                    }

                    failures += 1;
                    let delay = self.retry.backoff(failures);
                    warn!(
                        url = %url,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "WebUI request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
    }
}

fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_connect() {
        FailureKind::Connect
    } else if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Other
    }
}
