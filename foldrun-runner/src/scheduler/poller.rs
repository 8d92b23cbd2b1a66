//! Job poller
//!
//! Follows one submitted job until it reaches a terminal state.
//! Status is queried at a fixed interval; connection-level failures are
//! retried immediately on a fresh client, up to a limit of consecutive
//! failures.

use std::sync::Arc;

use foldrun_core::domain::job::{JobHandle, JobOutcome};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::backend::StatusClientFactory;
use crate::error::{JobError, StatusError};

/// Timing and retry limits for one poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause between two successful, non-terminal status queries
    pub interval: Duration,
    /// Consecutive transient failures tolerated before giving up
    pub retry_limit: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retry_limit: 5,
        }
    }
}

/// Polls the status of a single job until it finishes
///
/// Queries for a handle are issued strictly one after another, and none is
/// issued once a terminal state has been seen.
pub struct JobPoller {
    factory: Arc<dyn StatusClientFactory>,
    settings: PollSettings,
}

impl JobPoller {
    pub fn new(factory: Arc<dyn StatusClientFactory>, settings: PollSettings) -> Self {
        Self { factory, settings }
    }

    /// Waits for the job to reach a terminal state
    ///
    /// Returns the outcome when the job succeeds; every other terminal state
    /// is an error carrying that state.
    pub async fn wait(&self, handle: &JobHandle) -> Result<JobOutcome, JobError> {
        let mut client = self.factory.create();
        let mut retries: u32 = 0;
        let mut queries: u32 = 0;

        loop {
            queries += 1;

            match client.query(handle).await {
                Ok(state) => {
                    retries = 0;

                    if state.is_success() {
                        info!("Job {} completed successfully", handle);
                        return Ok(JobOutcome {
                            handle: handle.clone(),
                            state,
                            queries,
                            completed_at: chrono::Utc::now(),
                        });
                    }

                    if state.is_terminal() {
                        error!("Job {} ended in state {}", handle, state);
                        return Err(JobError::JobExecution {
                            handle: handle.clone(),
                            state,
                            detail: None,
                        });
                    }

                    debug!(
                        "Job {} is {}, next poll in {:?}",
                        handle, state, self.settings.interval
                    );
                    time::sleep(self.settings.interval).await;
                }
                Err(StatusError::Transient(message)) => {
                    retries += 1;

                    if retries >= self.settings.retry_limit {
                        error!(
                            "Status query for job {} failed after {} retries: {}",
                            handle, retries, message
                        );
                        return Err(JobError::PollingExhausted {
                            handle: handle.clone(),
                            attempts: retries,
                            last_error: message,
                        });
                    }

                    warn!(
                        "Connection error polling job {} ({}/{}): {}. Recreating status client",
                        handle, retries, self.settings.retry_limit, message
                    );
                    client = self.factory.create();
                }
                Err(StatusError::NotFound) => {
                    error!("Job {} is no longer visible to the status channel", handle);
                    return Err(JobError::OutcomeUnknown {
                        handle: handle.clone(),
                    });
                }
                Err(StatusError::Fatal(message)) => {
                    return Err(JobError::Query {
                        handle: handle.clone(),
                        message,
                    });
                }
            }
        }
    }
}
