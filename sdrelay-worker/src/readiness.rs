//! Readiness gate
//!
//! Blocks startup until the WebUI answers its health endpoint. The WebUI
//! can take minutes to load a checkpoint, so by default the gate waits
//! forever; a ceiling can be configured.

use async_trait::async_trait;
use sdrelay_client::{ClientError, WebUiClient};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

/// Something that can tell whether a dependency is reachable
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probes once; `Ok` means a response was received, whatever its status
    async fn check(&self, timeout: Duration) -> Result<(), ClientError>;

    /// What is being probed, for logs
    fn target(&self) -> String;
}

#[async_trait]
impl HealthProbe for WebUiClient {
    async fn check(&self, timeout: Duration) -> Result<(), ClientError> {
        let status = self.check_health(timeout).await?;
        debug!(status, "WebUI health endpoint answered");
        Ok(())
    }

    fn target(&self) -> String {
        self.health_url()
    }
}

/// Tunable parameters of the readiness loop
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Timeout of a single probe
    pub attempt_timeout: Duration,
    /// Pause between failed probes
    pub retry_delay: Duration,
    /// Log a notice every this many failures
    pub log_every: u32,
    /// Stop waiting after this long; `None` waits forever
    pub max_wait: Option<Duration>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(120),
            retry_delay: Duration::from_millis(200),
            log_every: 15,
            max_wait: None,
        }
    }
}

/// How the wait went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Probes issued, including the successful one
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("{target} not ready after {waited:?} ({attempts} attempts)")]
    TimedOut {
        target: String,
        waited: Duration,
        attempts: u32,
    },
}

/// Wait until `probe` gets a response
///
/// Probes are issued back to back with `retry_delay` in between. Every
/// `log_every`-th failure is logged so a slow start does not flood the
/// logs. With `max_wait` set, no probe or pause runs past the deadline.
pub async fn wait_for_service<P>(
    probe: &P,
    config: &ReadinessConfig,
) -> Result<ReadinessReport, ReadinessError>
where
    P: HealthProbe + ?Sized,
{
    let started = Instant::now();
    let target = probe.target();
    let mut failures = 0u32;

    info!(target = %target, "Waiting for service");

    loop {
        let mut timeout = config.attempt_timeout;
        if let Some(max_wait) = config.max_wait {
            let waited = started.elapsed();
            if waited >= max_wait {
                return Err(ReadinessError::TimedOut {
                    target,
                    waited,
                    attempts: failures,
                });
            }
            timeout = timeout.min(max_wait - waited);
        }

        let outcome = match tokio::time::timeout(timeout, probe.check(timeout)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("no response within {:?}", timeout)),
        };

        match outcome {
            Ok(()) => {
                let report = ReadinessReport {
                    attempts: failures + 1,
                    elapsed: started.elapsed(),
                };
                info!(
                    target = %target,
                    attempts = report.attempts,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Service is ready"
                );
                return Ok(report);
            }
            Err(e) => {
                failures += 1;
                if config.log_every > 0 && failures % config.log_every == 0 {
                    info!(target = %target, attempts = failures, "Service not ready yet. Retrying...");
                }
                debug!(error = %e, "Readiness probe failed");
            }
        }

        let delay = match config.max_wait {
            Some(max_wait) => config
                .retry_delay
                .min(max_wait.saturating_sub(started.elapsed())),
            None => config.retry_delay,
        };
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times, then succeeds
    struct FlakyProbe {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyProbe {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl HealthProbe for FlakyProbe {
        async fn check(&self, _timeout: Duration) -> Result<(), ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(ClientError::api_error(503, "loading"));
            }
            Ok(())
        }

        fn target(&self) -> String {
            "flaky".to_string()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ReadinessConfig::default();
        assert_eq!(config.attempt_timeout, Duration::from_secs(120));
        assert_eq!(config.retry_delay, Duration::from_millis(200));
        assert_eq!(config.log_every, 15);
        assert!(config.max_wait.is_none());
    }

    #[tokio::test]
    async fn test_returns_immediately_when_up() {
        let probe = FlakyProbe::new(0);
        let report = wait_for_service(&probe, &ReadinessConfig::default())
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_waits_out_failures_with_fixed_delay() {
        let probe = FlakyProbe::new(3);
        let report = wait_for_service(&probe, &ReadinessConfig::default())
            .await
            .unwrap();

        assert_eq!(report.attempts, 4);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
        // three 200ms pauses, one after each failure
        assert!(report.elapsed >= Duration::from_millis(600));
        assert!(report.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_max_wait_gives_up() {
        let probe = FlakyProbe::new(u32::MAX);
        let config = ReadinessConfig {
            retry_delay: Duration::from_millis(10),
            max_wait: Some(Duration::from_millis(100)),
            ..ReadinessConfig::default()
        };

        let err = wait_for_service(&probe, &config).await.unwrap_err();

        let ReadinessError::TimedOut { attempts, .. } = err;
        assert!(attempts >= 2);
        assert!(probe.calls.load(Ordering::SeqCst) >= 2);
    }

    /// Never answers, whatever timeout it is given
    struct StalledProbe {
        timeouts: std::sync::Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl HealthProbe for StalledProbe {
        async fn check(&self, timeout: Duration) -> Result<(), ClientError> {
            self.timeouts.lock().unwrap().push(timeout);
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        fn target(&self) -> String {
            "stalled".to_string()
        }
    }

    #[tokio::test]
    async fn test_max_wait_bounds_a_stalled_probe() {
        let probe = StalledProbe {
            timeouts: std::sync::Mutex::new(Vec::new()),
        };
        let config = ReadinessConfig {
            attempt_timeout: Duration::from_secs(3),
            max_wait: Some(Duration::from_millis(100)),
            ..ReadinessConfig::default()
        };

        let started = Instant::now();
        let err = wait_for_service(&probe, &config).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(1));
        let ReadinessError::TimedOut { attempts, .. } = err;
        assert_eq!(attempts, 1);
        let timeouts = probe.timeouts.lock().unwrap();
        assert!(timeouts[0] <= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_webui_client_probe_against_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WebUiClient::new(
            format!("http://{}/sdapi/v1", addr),
            sdrelay_client::RetryPolicy::none(),
        );
        let config = ReadinessConfig {
            retry_delay: Duration::from_millis(10),
            max_wait: Some(Duration::from_millis(50)),
            ..ReadinessConfig::default()
        };

        assert!(wait_for_service(&client, &config).await.is_err());
    }
}
