//! Job queue client
//!
//! Worker side of the serverless job-queue protocol: fetch the next job,
//! post its outcome, ping while alive. Endpoints are URL templates in which
//! `$ID` is replaced by the worker id (job and ping URLs) or the job id
//! (result URL).

use reqwest::Client;
use reqwest::StatusCode;
use sdrelay_core::dto::job::{JobEnvelope, JobOutcome};
use tracing::debug;

use crate::error::{ClientError, Result};

/// Placeholder substituted in endpoint templates
pub const ID_PLACEHOLDER: &str = "$ID";

/// Endpoint templates of a job queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEndpoints {
    /// Where to fetch the next job
    pub job_url: String,
    /// Where to post a job outcome
    pub result_url: String,
    /// Liveness ping, if the queue wants one
    pub ping_url: Option<String>,
}

/// HTTP client for the job queue
#[derive(Debug, Clone)]
pub struct QueueClient {
    endpoints: QueueEndpoints,
    worker_id: String,
    client: Client,
}

impl QueueClient {
    pub fn new(endpoints: QueueEndpoints, worker_id: impl Into<String>) -> Self {
        Self::with_client(endpoints, worker_id, Client::new())
    }

    pub fn with_client(
        endpoints: QueueEndpoints,
        worker_id: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            endpoints,
            worker_id: worker_id.into(),
            client,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn endpoints(&self) -> &QueueEndpoints {
        &self.endpoints
    }

    /// Fetch the next job, if any
    ///
    /// The queue answers `204 No Content` (or an empty body) when idle.
    pub async fn next_job(&self) -> Result<Option<JobEnvelope>> {
        let url = expand(&self.endpoints.job_url, &self.worker_id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), body));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let envelope: JobEnvelope = serde_json::from_str(&body)?;
        debug!(job_id = ?envelope.id, "Received job");
        Ok(Some(envelope))
    }

    /// Report the outcome of a job
    pub async fn post_outcome(&self, job_id: &str, outcome: &JobOutcome) -> Result<()> {
        let url = expand(&self.endpoints.result_url, job_id);
        let response = self.client.post(&url).json(outcome).send().await?;

        handle_empty_response(response).await
    }

    /// Tell the queue this worker is still alive
    ///
    /// A no-op when the queue has no ping endpoint.
    pub async fn ping(&self) -> Result<()> {
        let Some(template) = &self.endpoints.ping_url else {
            return Ok(());
        };
        let url = expand(template, &self.worker_id);
        let response = self.client.get(&url).send().await?;

        handle_empty_response(response).await
    }
}

fn expand(template: &str, id: &str) -> String {
    template.replace(ID_PLACEHOLDER, id)
}

/// Check the status of a response whose body is not needed
async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    async fn spawn_queue(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn endpoints(base: &str) -> QueueEndpoints {
        QueueEndpoints {
            job_url: format!("{}/job-take/$ID", base),
            result_url: format!("{}/job-done/$ID", base),
            ping_url: Some(format!("{}/ping/$ID", base)),
        }
    }

    #[test]
    fn test_expand_placeholder() {
        assert_eq!(expand("http://q/job/$ID?x=1", "w1"), "http://q/job/w1?x=1");
        assert_eq!(expand("http://q/job", "w1"), "http://q/job");
    }

    #[tokio::test]
    async fn test_next_job_returns_envelope() {
        let app = Router::new().route(
            "/job-take/{worker}",
            get(|Path(worker): Path<String>| async move {
                assert_eq!(worker, "worker-1");
                Json(json!({ "id": "job-1", "input": { "api": "getLoras" } }))
            }),
        );
        let client = QueueClient::new(endpoints(&spawn_queue(app).await), "worker-1");

        let job = client.next_job().await.unwrap().unwrap();
        assert_eq!(job.id.as_deref(), Some("job-1"));
        assert_eq!(job.input, json!({ "api": "getLoras" }));
    }

    #[tokio::test]
    async fn test_next_job_idle_queue() {
        let app = Router::new().route(
            "/job-take/{worker}",
            get(|| async { AxumStatus::NO_CONTENT }),
        );
        let client = QueueClient::new(endpoints(&spawn_queue(app).await), "worker-1");

        assert!(client.next_job().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_job_maps_error_status() {
        let app = Router::new().route(
            "/job-take/{worker}",
            get(|| async { (AxumStatus::UNAUTHORIZED, "bad token") }),
        );
        let client = QueueClient::new(endpoints(&spawn_queue(app).await), "worker-1");

        let err = client.next_job().await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_post_outcome_targets_job_url() {
        let posted: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&posted);
        let app = Router::new().route(
            "/job-done/{job}",
            post(move |Path(job): Path<String>, Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push((job, body));
                    AxumStatus::OK
                }
            }),
        );
        let client = QueueClient::new(endpoints(&spawn_queue(app).await), "worker-1");

        client
            .post_outcome("job-7", &JobOutcome::Error("boom".to_string()))
            .await
            .unwrap();

        let posted = posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "job-7");
        assert_eq!(posted[0].1, json!({ "error": "boom" }));
    }

    #[tokio::test]
    async fn test_ping_without_endpoint_is_noop() {
        let client = QueueClient::new(
            QueueEndpoints {
                job_url: "http://127.0.0.1:1/job".to_string(),
                result_url: "http://127.0.0.1:1/done".to_string(),
                ping_url: None,
            },
            "worker-1",
        );

        assert!(client.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_ping_hits_worker_url() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let app = Router::new().route(
            "/ping/{worker}",
            get(move |Path(worker): Path<String>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(worker);
                    AxumStatus::OK
                }
            }),
        );
        let client = QueueClient::new(endpoints(&spawn_queue(app).await), "worker-1");

        client.ping().await.unwrap();
        client.ping().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["worker-1", "worker-1"]);
    }

    #[tokio::test]
    async fn test_ping_rejected_is_api_error() {
        let app = Router::new().route(
            "/ping/{worker}",
            get(|| async { (AxumStatus::FORBIDDEN, "unknown worker") }),
        );
        let client = QueueClient::new(endpoints(&spawn_queue(app).await), "worker-1");

        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 403, ref body } if body == "unknown worker"));
    }
}
