//! Worker configuration
//!
//! Defines the configurable parameters of the worker: where the WebUI
//! lives, how long to wait for it, and how to reach the job queue.

use anyhow::{Result, bail};
use sdrelay_client::{DEFAULT_BASE_URL, QueueEndpoints};
use std::time::Duration;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this worker instance
    pub worker_id: String,

    /// WebUI API base URL (e.g., "http://127.0.0.1:3000/sdapi/v1")
    pub webui_url: String,

    /// Give up waiting for the WebUI after this long; `None` waits forever
    pub readiness_max_wait: Option<Duration>,

    /// Job queue endpoints; `None` disables the queue poller
    pub queue: Option<QueueEndpoints>,

    /// How often to ask the queue for a job
    pub poll_interval: Duration,

    /// How often to ping the queue
    pub ping_interval: Duration,

    /// Max jobs dispatched at the same time
    pub max_concurrency: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(worker_id: String, webui_url: String) -> Self {
        Self {
            worker_id,
            webui_url,
            readiness_max_wait: None,
            queue: None,
            poll_interval: Duration::from_secs(1),
            ping_interval: Duration::from_secs(10),
            max_concurrency: 1,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables (all optional):
    /// - WORKER_ID (default: random UUID)
    /// - WEBUI_API_URL (default: http://127.0.0.1:3000/sdapi/v1)
    /// - READINESS_MAX_WAIT (seconds, default: wait forever)
    /// - JOB_QUEUE_GET_URL / JOB_QUEUE_POST_URL / JOB_QUEUE_PING_URL
    /// - POLL_INTERVAL (seconds, default: 1)
    /// - PING_INTERVAL (seconds, default: 10)
    /// - MAX_CONCURRENCY (default: 1)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let worker_id = lookup("WORKER_ID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let webui_url = lookup("WEBUI_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut config = Self::new(worker_id, webui_url);

        config.readiness_max_wait = lookup("READINESS_MAX_WAIT")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);

        config.queue = match (lookup("JOB_QUEUE_GET_URL"), lookup("JOB_QUEUE_POST_URL")) {
            (Some(job_url), Some(result_url)) => Some(QueueEndpoints {
                job_url,
                result_url,
                ping_url: lookup("JOB_QUEUE_PING_URL"),
            }),
            (Some(_), None) => {
                bail!("JOB_QUEUE_POST_URL must be set when JOB_QUEUE_GET_URL is")
            }
            (None, _) => None,
        };

        if let Some(poll_interval) = lookup("POLL_INTERVAL").and_then(|s| s.parse::<u64>().ok()) {
            config.poll_interval = Duration::from_secs(poll_interval);
        }

        if let Some(ping_interval) = lookup("PING_INTERVAL").and_then(|s| s.parse::<u64>().ok()) {
            config.ping_interval = Duration::from_secs(ping_interval);
        }

        if let Some(max) = lookup("MAX_CONCURRENCY").and_then(|s| s.parse::<usize>().ok()) {
            config.max_concurrency = max;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_id.is_empty() {
            bail!("worker_id cannot be empty");
        }

        if !is_http_url(&self.webui_url) {
            bail!("webui_url must start with http:// or https://");
        }

        if let Some(queue) = &self.queue {
            if !is_http_url(&queue.job_url) || !is_http_url(&queue.result_url) {
                bail!("job queue URLs must start with http:// or https://");
            }
            if queue.ping_url.as_deref().is_some_and(|url| !is_http_url(url)) {
                bail!("job queue ping URL must start with http:// or https://");
            }
        }

        if self.poll_interval.is_zero() {
            bail!("poll_interval must be greater than 0");
        }

        if self.ping_interval.is_zero() {
            bail!("ping_interval must be greater than 0");
        }

        if self.max_concurrency == 0 {
            bail!("max_concurrency must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), DEFAULT_BASE_URL.to_string())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
