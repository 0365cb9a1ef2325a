//! Scheduler layer for the worker
//!
//! Job sources that feed the dispatcher: the queue poller for production
//! and a one-shot runner for local testing. The local HTTP API lives in
//! [`crate::api`].

pub mod oneshot;
pub mod poller;

pub use oneshot::{parse_test_input, run_job};
pub use poller::{JobQueue, QueuePoller};
