//! HTTP batch backend
//!
//! Adapts `BatchClient` to the submitter, status and cancel seams and maps
//! client errors onto the job error taxonomy.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use foldrun_client::{BatchClient, ClientError};
use foldrun_core::domain::job::{JobHandle, JobState};
use foldrun_core::domain::spec::JobSpec;
use tracing::{debug, info, warn};

use super::{JobCanceller, JobSubmitter, StatusClient, StatusClientFactory};
use crate::error::{JobError, StatusError};

/// Where the bearer token for the batch API comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TokenSource {
    #[default]
    None,
    /// Fixed token, used as given for the whole run
    Static(String),
    /// File holding the current token, read again on every connect
    ///
    /// Whatever refreshes credentials rewrites the file; new clients pick up
    /// the new token.
    File(PathBuf),
}

impl TokenSource {
    pub fn resolve(&self) -> std::io::Result<Option<String>> {
        match self {
            TokenSource::None => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::File(path) => {
                let token = std::fs::read_to_string(path)?.trim().to_string();
                if token.is_empty() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("token file {} is empty", path.display()),
                    ));
                }
                Ok(Some(token))
            }
        }
    }
}

/// Connection settings for the batch API
///
/// Kept separately from any client so a brand new client, with a freshly
/// read token, can be built whenever one is needed.
#[derive(Debug, Clone)]
pub struct BatchEndpoint {
    pub base_url: String,
    pub parent: String,
    pub token: TokenSource,
}

impl BatchEndpoint {
    pub fn connect(&self) -> std::io::Result<BatchClient> {
        let client = BatchClient::new(self.base_url.clone(), self.parent.clone());
        Ok(match self.token.resolve()? {
            Some(token) => client.with_token(token),
            None => client,
        })
    }
}

pub struct BatchSubmitter {
    endpoint: BatchEndpoint,
}

impl BatchSubmitter {
    pub fn new(endpoint: BatchEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl JobSubmitter for BatchSubmitter {
    async fn submit(&self, spec: &JobSpec) -> Result<JobHandle, JobError> {
        let client = self
            .endpoint
            .connect()
            .map_err(|e| JobError::submission(format!("failed to read API token: {}", e)))?;
        let job = client
            .create_custom_job(spec)
            .await
            .map_err(submission_error)?;

        info!("Created job '{}' as {}", spec.display_name(), job.name);
        Ok(JobHandle::new(job.name))
    }
}

/// Maps a failed create call, keeping the backend's response body
fn submission_error(err: ClientError) -> JobError {
    match err {
        ClientError::ApiError { status, message } => JobError::Submission {
            message: format!("backend rejected job (status {})", status),
            stdout: None,
            stderr: None,
            body: Some(message),
        },
        other => JobError::submission(other.to_string()),
    }
}

/// Status client backed by one `BatchClient`
///
/// Holds the connect error instead when the token could not be read, so the
/// poller sees a transient failure and asks for a new client.
pub struct BatchStatusClient {
    client: Result<BatchClient, String>,
}

#[async_trait]
impl StatusClient for BatchStatusClient {
    async fn query(&self, handle: &JobHandle) -> Result<JobState, StatusError> {
        let client = self
            .client
            .as_ref()
            .map_err(|e| StatusError::Transient(format!("failed to read API token: {}", e)))?;
        let job = client.get_custom_job(handle).await.map_err(status_error)?;

        let state = job.job_state().ok_or_else(|| {
            StatusError::Fatal(format!(
                "unknown job state '{}'",
                job.state.as_deref().unwrap_or_default()
            ))
        })?;

        if let Some(error) = job.error.as_ref().filter(|_| state.is_terminal()) {
            debug!("Job {} reported error {}: {}", handle, error.code, error.message);
        }

        Ok(state)
    }
}

/// Classifies a failed status call
///
/// Expired credentials (401) and a briefly unavailable backend (503) are
/// retried with a new client, like connection failures.
fn status_error(err: ClientError) -> StatusError {
    if err.is_transient() || err.is_unauthorized() || err.is_unavailable() {
        StatusError::Transient(err.to_string())
    } else if err.is_not_found() {
        StatusError::NotFound
    } else {
        StatusError::Fatal(err.to_string())
    }
}

/// Builds a new HTTP client per status client
pub struct BatchStatusClientFactory {
    endpoint: BatchEndpoint,
}

impl BatchStatusClientFactory {
    pub fn new(endpoint: BatchEndpoint) -> Self {
        Self { endpoint }
    }
}

impl StatusClientFactory for BatchStatusClientFactory {
    fn create(&self) -> Arc<dyn StatusClient> {
        debug!("Creating batch status client for {}", self.endpoint.base_url);
        let client = self.endpoint.connect().map_err(|e| {
            warn!("Failed to build batch status client: {}", e);
            e.to_string()
        });
        Arc::new(BatchStatusClient { client })
    }
}

/// Cancels jobs with a client built at cancel time
pub struct BatchCanceller {
    endpoint: BatchEndpoint,
}

impl BatchCanceller {
    pub fn new(endpoint: BatchEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl JobCanceller for BatchCanceller {
    async fn cancel(&self, handle: &JobHandle) -> Result<(), JobError> {
        let send_error = |message: String| JobError::CancellationSend {
            handle: handle.clone(),
            message,
        };
        let client = self
            .endpoint
            .connect()
            .map_err(|e| send_error(format!("failed to read API token: {}", e)))?;
        client
            .cancel_custom_job(handle)
            .await
            .map_err(|e| send_error(e.to_string()))
    }
}
