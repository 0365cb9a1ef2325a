pub mod job;
pub mod operation;
