//! Custom job API endpoints

use reqwest::Method;
use tracing::debug;

use crate::BatchClient;
use crate::error::{ClientError, Result};
use foldrun_core::domain::job::JobHandle;
use foldrun_core::domain::spec::JobSpec;
use foldrun_core::dto::job::{CreateCustomJob, CustomJob};

impl BatchClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Create a custom job from a spec
    ///
    /// This is a single, non-idempotent call: sending the same spec twice
    /// creates two jobs.
    ///
    /// # Returns
    /// The created job; its `name` is the handle for later calls
    pub async fn create_custom_job(&self, spec: &JobSpec) -> Result<CustomJob> {
        let url = format!("{}/{}/customJobs", self.base_url, self.parent);
        let payload = CreateCustomJob::from(spec);

        debug!("Creating custom job '{}' at {}", payload.display_name, url);
        let response = self.request(Method::POST, &url).json(&payload).send().await?;

        let job: CustomJob = self.handle_response(response).await?;
        if job.name.trim().is_empty() {
            return Err(ClientError::ParseError(
                "Create response did not include a job name".to_string(),
            ));
        }

        Ok(job)
    }

    /// Get a custom job by handle
    pub async fn get_custom_job(&self, handle: &JobHandle) -> Result<CustomJob> {
        let url = self.job_url(handle)?;
        let response = self.request(Method::GET, &url).send().await?;

        self.handle_response(response).await
    }

    /// Request cancellation of a custom job
    ///
    /// The backend acknowledges the request; the job reaches its cancelled
    /// state asynchronously.
    pub async fn cancel_custom_job(&self, handle: &JobHandle) -> Result<()> {
        let url = format!("{}:cancel", self.job_url(handle)?);
        let response = self.request(Method::POST, &url).send().await?;

        self.handle_empty_response(response).await
    }

    fn job_url(&self, handle: &JobHandle) -> Result<String> {
        let name = handle.as_str().trim_matches('/');
        if name.is_empty() {
            return Err(ClientError::InvalidRequest("empty job handle".to_string()));
        }
        Ok(format!("{}/{}", self.base_url, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_url() {
        let client = BatchClient::new("http://localhost:8080/v1", "projects/p/locations/l");
        let handle = JobHandle::new("projects/p/locations/l/customJobs/42");
        assert_eq!(
            client.job_url(&handle).unwrap(),
            "http://localhost:8080/v1/projects/p/locations/l/customJobs/42"
        );
        assert!(client.job_url(&JobHandle::new("")).is_err());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let client = BatchClient::new("http://127.0.0.1:1/v1", "projects/p/locations/l");
        let err = client
            .get_custom_job(&JobHandle::new("projects/p/locations/l/customJobs/1"))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {err}");
    }
}
