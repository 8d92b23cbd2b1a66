//! Error types for submitting and waiting on jobs

use foldrun_core::SpecError;
use foldrun_core::domain::job::{JobHandle, JobState};
use thiserror::Error;

/// Failures of the job lifecycle, from spec validation to the final state
#[derive(Debug, Error)]
pub enum JobError {
    /// The spec was rejected before anything was sent
    #[error(transparent)]
    Configuration(#[from] SpecError),

    /// The backend or local tool refused to create the job
    ///
    /// Not retried. The remote side may still hold an orphaned job.
    /// `stdout` and `stderr` come from the local submit tool, `body` from an
    /// HTTP error response.
    #[error("Job submission failed: {message}")]
    Submission {
        message: String,
        stdout: Option<String>,
        stderr: Option<String>,
        body: Option<String>,
    },

    /// A status query failed in a way a new client will not fix
    #[error("Status query for job {handle} failed: {message}")]
    Query { handle: JobHandle, message: String },

    /// Too many consecutive transient failures while polling
    #[error("Polling job {handle} failed after {attempts} consecutive connection errors: {last_error}")]
    PollingExhausted {
        handle: JobHandle,
        attempts: u32,
        last_error: String,
    },

    /// The job reached a terminal state other than success
    #[error("Job {handle} ended in state {state}{}", detail_suffix(.detail))]
    JobExecution {
        handle: JobHandle,
        state: JobState,
        detail: Option<String>,
    },

    /// The job is no longer visible and left no final status behind
    #[error("Job {handle} disappeared without reporting a final status")]
    OutcomeUnknown { handle: JobHandle },

    /// The wait was interrupted by a shutdown signal
    #[error("Waiting on job {handle} was interrupted")]
    Interrupted { handle: JobHandle },

    /// A cancel request could not be delivered
    ///
    /// Only ever logged by the cancellation guard.
    #[error("Failed to send cancel request for job {handle}: {message}")]
    CancellationSend { handle: JobHandle, message: String },
}

impl JobError {
    pub fn submission(message: impl Into<String>) -> Self {
        Self::Submission {
            message: message.into(),
            stdout: None,
            stderr: None,
            body: None,
        }
    }

    /// True when the error itself reports a terminal job state
    ///
    /// In every other case the job may still be running remotely.
    pub fn is_terminal_observation(&self) -> bool {
        matches!(self, Self::JobExecution { .. })
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) if !detail.trim().is_empty() => format!(": {}", detail.trim()),
        _ => String::new(),
    }
}

/// Failure of a single status query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// Connection-level failure; a fresh client may succeed
    #[error("transient status error: {0}")]
    Transient(String),

    /// The job can no longer be found by the status channel
    #[error("job not found")]
    NotFound,

    /// Any other failure; retrying will not help
    #[error("status error: {0}")]
    Fatal(String),
}
