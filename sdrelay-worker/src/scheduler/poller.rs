//! Queue poller
//!
//! Polls the job queue, dispatches each job on its own task and reports
//! the outcome. Concurrency is bounded by a semaphore; a ping task keeps
//! the worker registered as alive while the poller runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sdrelay_client::QueueClient;
use sdrelay_core::dto::job::{JobEnvelope, JobOutcome};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::service::{JobHandler, handle_isolated, into_outcome};

/// Where jobs come from and where their outcomes go
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Fetches the next job, `None` when the queue is idle
    async fn next_job(&self) -> Result<Option<JobEnvelope>>;

    /// Reports the outcome of a job
    async fn post_outcome(&self, job_id: &str, outcome: &JobOutcome) -> Result<()>;

    /// Signals the worker is alive
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
impl JobQueue for QueueClient {
    async fn next_job(&self) -> Result<Option<JobEnvelope>> {
        Ok(QueueClient::next_job(self).await?)
    }

    async fn post_outcome(&self, job_id: &str, outcome: &JobOutcome) -> Result<()> {
        Ok(QueueClient::post_outcome(self, job_id, outcome).await?)
    }

    async fn ping(&self) -> Result<()> {
        Ok(QueueClient::ping(self).await?)
    }
}

/// Job poller that continuously takes and runs jobs
pub struct QueuePoller {
    config: Config,
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    semaphore: Arc<Semaphore>,
}

impl QueuePoller {
    /// Creates a new queue poller
    pub fn new(config: Config, queue: Arc<dyn JobQueue>, handler: Arc<dyn JobHandler>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        Self {
            config,
            queue,
            handler,
            semaphore,
        }
    }

    /// Starts the polling loop
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting queue poller (interval: {:?}, max concurrency: {})",
            self.config.poll_interval, self.config.max_concurrency
        );

        let mut ping_handle = self.start_ping_loop();

        let mut interval = time::interval(self.config.poll_interval);

        loop {
            interval.tick().await;

            match self.poll_and_execute_once().await {
                Ok(executed) => {
                    if executed > 0 {
                        info!("Executed {} job(s) this cycle", executed);
                    }
                }
                Err(e) => {
                    error!("Error during poll cycle: {:#}", e);
                }
            }

            self.ensure_ping_loop(&mut ping_handle);
        }
    }

    /// Performs a single poll cycle
    ///
    /// Takes jobs until the queue is idle or every permit is in use, then
    /// waits for the taken jobs to finish.
    pub async fn poll_and_execute_once(&self) -> Result<usize> {
        let mut handles = Vec::new();

        let fetched: Result<()> = loop {
            let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                debug!("Max concurrency reached, not taking more jobs");
                break Ok(());
            };

            match self.queue.next_job().await {
                Ok(Some(job)) => handles.push(self.spawn_job_task(job, permit)),
                Ok(None) => {
                    debug!("No jobs available");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };

        let executed = handles.len();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Job task panicked: {}", e);
            }
        }

        fetched.context("Failed to fetch next job")?;
        Ok(executed)
    }

    /// Spawns a task to execute a single job
    fn spawn_job_task(&self, job: JobEnvelope, permit: OwnedSemaphorePermit) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let handler = Arc::clone(&self.handler);

        tokio::spawn(async move {
            Self::execute_job(job, handler, queue).await;
            // Permit is released when dropped
            drop(permit);
        })
    }

    /// Executes a single job and reports its outcome
    async fn execute_job(job: JobEnvelope, handler: Arc<dyn JobHandler>, queue: Arc<dyn JobQueue>) {
        let Some(job_id) = job.id else {
            warn!("Received job without an id, dropping it");
            return;
        };

        info!(job_id = %job_id, "Starting job");

        let outcome = into_outcome(handle_isolated(handler, job.input).await);

        if let Err(e) = queue.post_outcome(&job_id, &outcome).await {
            error!(job_id = %job_id, "Failed to report job outcome: {:#}", e);
            return;
        }

        info!(job_id = %job_id, failed = outcome.is_error(), "Job finished");
    }

    /// Replaces the ping task if it has stopped
    fn ensure_ping_loop(&self, handle: &mut JoinHandle<()>) {
        if handle.is_finished() {
            warn!("Ping task stopped, restarting it");
            *handle = self.start_ping_loop();
        }
    }

    /// Starts a background task that pings the queue
    fn start_ping_loop(&self) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let ping_interval = self.config.ping_interval;

        tokio::spawn(async move {
            let mut ticker = time::interval(ping_interval);

            loop {
                ticker.tick().await;

                debug!("Sending ping");

                if let Err(e) = queue.ping().await {
                    warn!("Failed to ping job queue: {:#}", e);
                }
            }
        })
    }
}
