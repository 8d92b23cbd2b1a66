//! Job execution
//!
//! Composes a backend's submitter, status clients and canceller into one
//! run: submit the spec, then wait on the job under a cancellation guard.

use std::sync::Arc;

use foldrun_core::JobSpecBuilder;
use foldrun_core::domain::job::JobOutcome;
use foldrun_core::domain::spec::JobSpec;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::{
    BatchCanceller, BatchStatusClientFactory, BatchSubmitter, JobCanceller, JobSubmitter,
    LocalCanceller, LocalStatusClientFactory, LocalSubmitter, LocalTool, StatusClientFactory,
};
use crate::config::{Backend, Config, LocalWaitMode};
use crate::error::JobError;
use crate::request::JobRequest;
use crate::scheduler::{CancellationGuard, JobPoller, PollSettings};

/// Submits one job and follows it to a terminal state
pub struct JobRunner {
    submitter: Arc<dyn JobSubmitter>,
    poller: JobPoller,
    canceller: Arc<dyn JobCanceller>,
}

impl JobRunner {
    pub fn new(
        submitter: Arc<dyn JobSubmitter>,
        factory: Arc<dyn StatusClientFactory>,
        canceller: Arc<dyn JobCanceller>,
        settings: PollSettings,
    ) -> Self {
        Self {
            submitter,
            poller: JobPoller::new(factory, settings),
            canceller,
        }
    }

    /// Runner for the HTTP batch backend
    pub fn batch(config: &Config) -> Self {
        let endpoint = config.batch_endpoint();
        Self::new(
            Arc::new(BatchSubmitter::new(endpoint.clone())),
            Arc::new(BatchStatusClientFactory::new(endpoint.clone())),
            Arc::new(BatchCanceller::new(endpoint)),
            config.poll_settings(),
        )
    }

    /// Runner for the local tool backend in poll mode
    pub fn local(submitter: LocalSubmitter, tool: Arc<LocalTool>, settings: PollSettings) -> Self {
        Self::new(
            Arc::new(submitter),
            Arc::new(LocalStatusClientFactory::new(Arc::clone(&tool))),
            Arc::new(LocalCanceller::new(tool)),
            settings,
        )
    }

    /// Submits `spec` and waits for it
    ///
    /// The submission itself is a single attempt. Once a handle exists the
    /// wait runs under a `CancellationGuard`, so an interrupted or failed wait
    /// requests cancellation of the job.
    pub async fn run(
        &self,
        spec: &JobSpec,
        shutdown: &CancellationToken,
    ) -> Result<JobOutcome, JobError> {
        let handle = self.submitter.submit(spec).await?;
        info!("Waiting on job {}", handle);

        let guard = CancellationGuard::arm(handle.clone(), Arc::clone(&self.canceller));
        guard.run(self.poller.wait(&handle), shutdown).await
    }

    /// Builds the spec, then runs it
    ///
    /// A spec that fails validation is reported before anything is submitted.
    pub async fn build_and_run(
        &self,
        builder: &JobSpecBuilder,
        shutdown: &CancellationToken,
    ) -> Result<JobOutcome, JobError> {
        let spec = builder.build()?;
        self.run(&spec, shutdown).await
    }
}

/// Runs a request against the configured backend
///
/// In the local tool-wait mode the submit tool itself blocks until the job
/// ends; the job is still deleted on shutdown once the tool has named it.
pub async fn run_request(
    config: &Config,
    request: &JobRequest,
    shutdown: &CancellationToken,
) -> Result<JobOutcome, JobError> {
    let spec = request.build_spec(config.network.as_deref())?;

    match (config.backend, config.local_wait_mode) {
        (Backend::Batch, _) => JobRunner::batch(config).run(&spec, shutdown).await,
        (Backend::Local, LocalWaitMode::Tool) => {
            let submitter = request.local_submitter(Arc::new(config.local.clone()));
            submitter.run_to_completion(&spec, shutdown).await
        }
        (Backend::Local, LocalWaitMode::Poll) => {
            let tool = Arc::new(config.local.clone());
            let submitter = request.local_submitter(Arc::clone(&tool));
            JobRunner::local(submitter, tool, config.poll_settings())
                .run(&spec, shutdown)
                .await
        }
    }
}
