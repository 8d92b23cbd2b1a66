//! Foldrun Runner
//!
//! Submits pipeline steps as remote batch jobs and follows them to a
//! terminal state.
//!
//! Architecture:
//! - Configuration: backend selection and polling limits from the environment
//! - Requests: JSON job requests turned into validated specs
//! - Backends: HTTP batch API or local command-line tools behind shared traits
//! - Scheduler: the status poller and the cancellation guard
//! - Execution: submit, then wait under the guard

pub mod backend;
pub mod config;
pub mod error;
pub mod execution;
pub mod request;
pub mod scheduler;
pub mod shutdown;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Backend, Config, LocalWaitMode};
pub use error::{JobError, StatusError};
pub use execution::{JobRunner, run_request};
pub use request::JobRequest;
