//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one remote execution
///
/// Returned by a successful submission. A handle is never reused for a
/// second execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job execution state as observed through a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Paused,
}

impl JobState {
    /// No further transition happens from a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled | JobState::Paused
        )
    }

    pub fn is_success(self) -> bool {
        self == JobState::Succeeded
    }

    /// Maps a backend state name (`JOB_STATE_*`) onto a job state
    ///
    /// Transitional backend states collapse onto the closest state here:
    /// queued work is pending, cancelling or updating work is still running,
    /// and expired work has failed. Unknown names return `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        let name = name.strip_prefix("JOB_STATE_").unwrap_or(name);
        match name {
            "UNSPECIFIED" | "QUEUED" | "PENDING" => Some(JobState::Pending),
            "RUNNING" | "CANCELLING" | "UPDATING" => Some(JobState::Running),
            "SUCCEEDED" => Some(JobState::Succeeded),
            "FAILED" | "EXPIRED" => Some(JobState::Failed),
            "CANCELLED" => Some(JobState::Cancelled),
            "PAUSED" => Some(JobState::Paused),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            JobState::Pending => "JOB_STATE_PENDING",
            JobState::Running => "JOB_STATE_RUNNING",
            JobState::Succeeded => "JOB_STATE_SUCCEEDED",
            JobState::Failed => "JOB_STATE_FAILED",
            JobState::Cancelled => "JOB_STATE_CANCELLED",
            JobState::Paused => "JOB_STATE_PAUSED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Result of waiting on a job that reached `Succeeded`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub handle: JobHandle,
    pub state: JobState,
    /// Number of status queries issued, transient failures included
    pub queries: u32,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}
