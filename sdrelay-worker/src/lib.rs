//! `sdrelay-worker` library crate.
//!
//! The binary entrypoint lives in `main.rs`. Modules are exposed here so
//! that job sources and the dispatcher can be tested in isolation.

pub mod api;
pub mod config;
pub mod mode;
pub mod readiness;
pub mod scheduler;
pub mod service;
