//! sdrelay Core
//!
//! Core types shared by the sdrelay client and worker.
//!
//! This crate contains:
//! - Domain types: job input and the closed set of downstream operations
//! - DTOs: job envelopes and outcomes exchanged with job sources

pub mod domain;
pub mod dto;
