//! Cancellation guard
//!
//! Ties a submitted job to the lifetime of the wait on it. If the wait is
//! interrupted or fails while the job may still be running, one cancel
//! request is sent for it.

use std::future::Future;
use std::sync::Arc;

use foldrun_core::domain::job::JobHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::JobCanceller;
use crate::error::JobError;

/// Sends at most one cancel request for a job
pub struct CancellationGuard {
    handle: JobHandle,
    canceller: Arc<dyn JobCanceller>,
    armed: bool,
}

impl CancellationGuard {
    /// Arms a guard for a job that has just been submitted
    pub fn arm(handle: JobHandle, canceller: Arc<dyn JobCanceller>) -> Self {
        Self {
            handle,
            canceller,
            armed: true,
        }
    }

    /// Disarms the guard; no cancel request will be sent
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Runs `work` under the guard
    ///
    /// # Arguments
    /// * `work` - Future waiting on the job, usually the poller
    /// * `shutdown` - Token cancelled when the process is asked to stop
    ///
    /// # Returns
    /// The result of `work`, or `JobError::Interrupted` when the token fires
    /// first. A cancel request is sent when the token fires or when `work`
    /// fails without having observed a terminal state. A failed cancel
    /// request is logged and never replaces the original error.
    pub async fn run<F, T>(mut self, work: F, shutdown: &CancellationToken) -> Result<T, JobError>
    where
        F: Future<Output = Result<T, JobError>>,
    {
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Interrupted while waiting on job {}", self.handle);
                Err(JobError::Interrupted { handle: self.handle.clone() })
            }
            result = work => result,
        };

        match &result {
            Ok(_) => self.disarm(),
            Err(e) if e.is_terminal_observation() => self.disarm(),
            Err(_) => self.cancel_once().await,
        }

        result
    }

    async fn cancel_once(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        info!("Requesting cancellation of job {}", self.handle);
        if let Err(e) = self.canceller.cancel(&self.handle).await {
            warn!("Cancel request for job {} failed: {}", self.handle, e);
        }
    }
}

impl Drop for CancellationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                "Guard for job {} dropped outside a runtime, cancel not sent",
                self.handle
            );
            return;
        };

        let handle = self.handle.clone();
        let canceller = Arc::clone(&self.canceller);
        info!("Wait on job {} abandoned, requesting cancellation", handle);
        runtime.spawn(async move {
            if let Err(e) = canceller.cancel(&handle).await {
                warn!("Cancel request for job {} failed: {}", handle, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{JobPoller, PollSettings};
    use crate::testing::{CountingCanceller, ScriptedStatus, transient};
    use foldrun_core::domain::job::JobState;
    use tokio::time::{self, Duration};

    fn poller(status: &Arc<ScriptedStatus>) -> JobPoller {
        JobPoller::new(
            status.factory(),
            PollSettings {
                interval: Duration::from_secs(60),
                retry_limit: 3,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_sends_no_cancel() {
        let status = ScriptedStatus::new([Ok(JobState::Running), Ok(JobState::Succeeded)]);
        let canceller = CountingCanceller::new();
        let handle = JobHandle::new("job-1");
        let token = CancellationToken::new();

        let guard = CancellationGuard::arm(handle.clone(), canceller.clone());
        let outcome = guard.run(poller(&status).wait(&handle), &token).await;

        assert!(outcome.is_ok());
        assert_eq!(canceller.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_sends_one_cancel() {
        let status = ScriptedStatus::new(std::iter::repeat_n(Ok(JobState::Running), 10));
        let canceller = CountingCanceller::new();
        let handle = JobHandle::new("job-1");
        let token = CancellationToken::new();

        let trigger = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(90)).await;
            trigger.cancel();
        });

        let guard = CancellationGuard::arm(handle.clone(), canceller.clone());
        let err = guard
            .run(poller(&status).wait(&handle), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Interrupted { .. }));
        assert_eq!(canceller.calls(), 1);
        assert_eq!(status.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_sends_no_cancel() {
        let status = ScriptedStatus::new([Ok(JobState::Failed)]);
        let canceller = CountingCanceller::new();
        let handle = JobHandle::new("job-1");

        let guard = CancellationGuard::arm(handle.clone(), canceller.clone());
        let err = guard
            .run(poller(&status).wait(&handle), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::JobExecution { .. }));
        assert_eq!(canceller.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_polling_sends_cancel() {
        let status = ScriptedStatus::new([transient(), transient(), transient()]);
        let canceller = CountingCanceller::new();
        let handle = JobHandle::new("job-1");

        let guard = CancellationGuard::arm(handle.clone(), canceller.clone());
        let err = guard
            .run(poller(&status).wait(&handle), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::PollingExhausted { .. }));
        assert_eq!(canceller.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cancel_keeps_original_error() {
        let status = ScriptedStatus::new(std::iter::repeat_n(Ok(JobState::Running), 10));
        let canceller = CountingCanceller::failing();
        let handle = JobHandle::new("job-1");
        let token = CancellationToken::new();
        token.cancel();

        let guard = CancellationGuard::arm(handle.clone(), canceller.clone());
        let err = guard
            .run(poller(&status).wait(&handle), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Interrupted { .. }));
        assert_eq!(canceller.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_cancels_on_drop() {
        let status = ScriptedStatus::new(std::iter::repeat_n(Ok(JobState::Running), 10));
        let canceller = CountingCanceller::new();
        let handle = JobHandle::new("job-1");
        let token = CancellationToken::new();

        let guard = CancellationGuard::arm(handle.clone(), canceller.clone());
        let poller = poller(&status);
        let abandoned = time::timeout(
            Duration::from_secs(30),
            guard.run(poller.wait(&handle), &token),
        )
        .await;
        assert!(abandoned.is_err());

        // let the spawned cancel run
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(canceller.calls(), 1);
    }

    #[test]
    fn test_disarmed_guard_drops_quietly() {
        let canceller = CountingCanceller::new();
        let mut guard = CancellationGuard::arm(JobHandle::new("job-1"), canceller.clone());
        guard.disarm();
        drop(guard);
        assert_eq!(canceller.calls(), 0);
    }
}
