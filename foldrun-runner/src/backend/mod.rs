//! Backend layer
//!
//! A backend knows how to create a job, ask for its state and request its
//! cancellation. Two implementations share these seams:
//! - `batch`: the HTTP custom job API, through `foldrun-client`
//! - `local`: a command-line batch tool driven as subprocesses
//!
//! All seams are trait-based so the poller and guard can be tested with
//! scripted fakes.

pub mod batch;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use foldrun_core::domain::job::{JobHandle, JobState};
use foldrun_core::domain::spec::JobSpec;

use crate::error::{JobError, StatusError};

pub use batch::{BatchCanceller, BatchStatusClientFactory, BatchSubmitter};
pub use local::{LocalCanceller, LocalStatusClientFactory, LocalSubmitter, LocalTool};

/// Creates remote jobs
///
/// A submission is a single attempt and is not idempotent: submitting the
/// same spec twice creates two jobs. Callers own any re-submission policy.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, spec: &JobSpec) -> Result<JobHandle, JobError>;
}

/// Reads the current state of a job
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn query(&self, handle: &JobHandle) -> Result<JobState, StatusError>;
}

/// Builds status clients
///
/// The poller asks for a fresh client after every transient failure, so
/// expired connections or credentials are not reused.
pub trait StatusClientFactory: Send + Sync {
    fn create(&self) -> Arc<dyn StatusClient>;
}

impl<F> StatusClientFactory for F
where
    F: Fn() -> Arc<dyn StatusClient> + Send + Sync,
{
    fn create(&self) -> Arc<dyn StatusClient> {
        self()
    }
}

/// Requests cancellation of a job, best-effort
#[async_trait]
pub trait JobCanceller: Send + Sync {
    async fn cancel(&self, handle: &JobHandle) -> Result<(), JobError>;
}
