//! Retry policy for WebUI calls
//!
//! The WebUI answers 502/503/504 while it is still loading a model or
//! swapping checkpoints. Idempotent calls are replayed transparently with
//! exponential backoff; generation requests are never replayed on a
//! status because the first attempt may still be running.

use sdrelay_core::domain::operation::HttpMethod;
use std::time::Duration;

/// Why an attempt produced no response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The connection could not be established; nothing reached the server
    Connect,
    /// The request was sent but no response arrived in time
    Timeout,
    /// Anything else (body errors, protocol errors)
    Other,
}

/// Immutable retry configuration shared by every call of a client
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Base of the exponential backoff
    pub backoff_factor: Duration,
    /// Upper bound for a single backoff sleep
    pub backoff_max: Duration,
    /// Statuses that trigger a retry of idempotent requests
    pub status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_factor: Duration::from_millis(100),
            backoff_max: Duration::from_secs(120),
            status_forcelist: vec![502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether a response with `status` should be retried
    pub fn retries_status(&self, method: HttpMethod, status: u16) -> bool {
        self.max_retries > 0 && method.is_idempotent() && self.status_forcelist.contains(&status)
    }

    /// Whether a failed attempt should be retried
    pub fn retries_failure(&self, method: HttpMethod, kind: FailureKind) -> bool {
        if self.max_retries == 0 {
            return false;
        }
        match kind {
            FailureKind::Connect => true,
            FailureKind::Timeout => method.is_idempotent(),
            FailureKind::Other => false,
        }
    }

    /// Sleep before the next attempt after `consecutive_failures` failures
    ///
    /// No sleep after the first failure, then `factor * 2^(n-1)`.
    pub fn backoff(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures <= 1 {
            return Duration::ZERO;
        }
        let multiplier = 2u32.saturating_pow(consecutive_failures - 1);
        self.backoff_factor
            .saturating_mul(multiplier)
            .min(self.backoff_max)
    }
}

/// Parses a `Retry-After` header given in seconds
///
/// HTTP-date values are ignored and the computed backoff is used instead.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 10);
        assert_eq!(policy.backoff_factor, Duration::from_millis(100));
        assert_eq!(policy.status_forcelist, vec![502, 503, 504]);
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy::default();
        let expected_ms = [0, 0, 200, 400, 800, 1600, 3200];

        for (failures, expected) in expected_ms.iter().enumerate() {
            assert_eq!(
                policy.backoff(failures as u32),
                Duration::from_millis(*expected),
                "failures = {}",
                failures
            );
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(40), Duration::from_secs(120));
    }

    #[test]
    fn test_status_retry_only_for_idempotent_methods() {
        let policy = RetryPolicy::default();
        assert!(policy.retries_status(HttpMethod::Get, 503));
        assert!(policy.retries_status(HttpMethod::Get, 502));
        assert!(!policy.retries_status(HttpMethod::Get, 500));
        assert!(!policy.retries_status(HttpMethod::Get, 404));
        assert!(!policy.retries_status(HttpMethod::Post, 503));
    }

    #[test]
    fn test_failure_retry_rules() {
        let policy = RetryPolicy::default();
        assert!(policy.retries_failure(HttpMethod::Post, FailureKind::Connect));
        assert!(policy.retries_failure(HttpMethod::Get, FailureKind::Timeout));
        assert!(!policy.retries_failure(HttpMethod::Post, FailureKind::Timeout));
        assert!(!policy.retries_failure(HttpMethod::Get, FailureKind::Other));
    }

    #[test]
    fn test_none_never_retries() {
        let policy = RetryPolicy::none();
        assert!(!policy.retries_status(HttpMethod::Get, 503));
        assert!(!policy.retries_failure(HttpMethod::Get, FailureKind::Connect));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
