//! Run mode selection
//!
//! Decides where jobs come from before anything waits on the WebUI, so a
//! bad flag or a missing queue fails at startup instead of after the
//! readiness gate.

use anyhow::{Context, Result, bail};
use sdrelay_client::QueueEndpoints;
use sdrelay_core::dto::job::JobEnvelope;
use std::net::SocketAddr;

use crate::scheduler::parse_test_input;

/// Where the worker takes its jobs from
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    /// Run one job and exit
    TestInput(JobEnvelope),
    /// Serve the local HTTP API
    ServeApi(SocketAddr),
    /// Poll the job queue
    Poll(QueueEndpoints),
}

/// Job-source flags as given on the command line
#[derive(Debug, Clone, Default)]
pub struct ModeArgs {
    pub test_input: Option<String>,
    pub serve_api: bool,
    pub api_host: String,
    pub api_port: u16,
}

impl RunMode {
    /// Picks the run mode
    ///
    /// A test input wins over the local API, which wins over the queue.
    pub fn resolve(args: &ModeArgs, queue: Option<QueueEndpoints>) -> Result<Self> {
        if let Some(raw) = &args.test_input {
            return Ok(Self::TestInput(parse_test_input(raw)?));
        }

        if args.serve_api {
            let addr: SocketAddr = format!("{}:{}", args.api_host, args.api_port)
                .parse()
                .with_context(|| {
                    format!("Invalid local API address {}:{}", args.api_host, args.api_port)
                })?;
            return Ok(Self::ServeApi(addr));
        }

        match queue {
            Some(endpoints) => Ok(Self::Poll(endpoints)),
            None => {
                bail!("No job source configured: set JOB_QUEUE_GET_URL, --serve-api or --test-input")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args() -> ModeArgs {
        ModeArgs {
            api_host: "127.0.0.1".to_string(),
            api_port: 8000,
            ..ModeArgs::default()
        }
    }

    fn queue() -> QueueEndpoints {
        QueueEndpoints {
            job_url: "http://queue/job-take/$ID".to_string(),
            result_url: "http://queue/job-done/$ID".to_string(),
            ping_url: None,
        }
    }

    #[test]
    fn test_no_job_source_is_error() {
        let err = RunMode::resolve(&args(), None).unwrap_err();
        assert!(err.to_string().contains("No job source configured"));
    }

    #[test]
    fn test_queue_is_default_source() {
        assert_eq!(RunMode::resolve(&args(), Some(queue())).unwrap(), RunMode::Poll(queue()));
    }

    #[test]
    fn test_test_input_is_parsed_up_front() {
        let args = ModeArgs {
            test_input: Some(r#"{"input": {"api": "getLoras"}}"#.to_string()),
            serve_api: true,
            ..args()
        };

        let RunMode::TestInput(job) = RunMode::resolve(&args, Some(queue())).unwrap() else {
            panic!("expected test input mode");
        };
        assert_eq!(job.input, json!({ "api": "getLoras" }));
    }

    #[test]
    fn test_malformed_test_input_is_error() {
        let args = ModeArgs {
            test_input: Some("{\"input\": ".to_string()),
            ..args()
        };

        assert!(RunMode::resolve(&args, Some(queue())).is_err());
    }

    #[test]
    fn test_serve_api_address() {
        let args = ModeArgs {
            serve_api: true,
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            ..args()
        };

        assert_eq!(
            RunMode::resolve(&args, None).unwrap(),
            RunMode::ServeApi("0.0.0.0:8080".parse().unwrap())
        );
    }

    #[test]
    fn test_invalid_api_host_is_error() {
        let args = ModeArgs {
            serve_api: true,
            api_host: "not a host".to_string(),
            ..args()
        };

        let err = RunMode::resolve(&args, Some(queue())).unwrap_err();
        assert!(err.to_string().contains("Invalid local API address"));
    }
}
