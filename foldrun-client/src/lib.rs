//! Foldrun HTTP Client
//!
//! A small, typed HTTP client for the batch backend that runs pipeline steps
//! as custom jobs.
//!
//! The client covers the three calls the job lifecycle needs: create a job,
//! read its state and request cancellation.
//!
//! # Example
//!
//! ```no_run
//! use foldrun_client::BatchClient;
//! use foldrun_core::JobSpecBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BatchClient::new(
//!         "https://us-central1-aiplatform.googleapis.com/v1",
//!         "projects/my-project/locations/us-central1",
//!     );
//!
//!     let spec = JobSpecBuilder::new()
//!         .display_name("search-uniref90")
//!         .image("tool:latest")
//!         .command(["run"])
//!         .build()?;
//!
//!     let job = client.create_custom_job(&spec).await?;
//!     println!("Created job: {}", job.name);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use foldrun_core::dto::job::CustomJob;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

/// HTTP client for the batch backend's custom job API
#[derive(Debug, Clone)]
pub struct BatchClient {
    /// Versioned API root (e.g., "https://us-central1-aiplatform.googleapis.com/v1")
    base_url: String,
    /// Resource parent under which jobs are created (e.g., "projects/p/locations/l")
    parent: String,
    /// Bearer token sent with every request, if any
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl BatchClient {
    /// Create a new batch client
    ///
    /// # Arguments
    /// * `base_url` - The versioned API root
    /// * `parent` - The resource parent jobs are created under
    pub fn new(base_url: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::with_client(base_url, parent, Client::new())
    }

    /// Create a new batch client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use foldrun_client::BatchClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = BatchClient::with_client(
    ///     "http://localhost:8080/v1",
    ///     "projects/p/locations/l",
    ///     http_client,
    /// );
    /// ```
    pub fn with_client(
        base_url: impl Into<String>,
        parent: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        let parent = parent.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            parent: parent.trim_matches('/').to_string(),
            token: None,
            client,
        }
    }

    /// Attach a bearer token to every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the resource parent jobs are created under
    pub fn parent(&self) -> &str {
        &self.parent
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// The response body is kept as the error message on a non-success
    /// status so callers can surface the backend's diagnostics.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is not needed
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
