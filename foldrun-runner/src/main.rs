//! Foldrun Runner binary
//!
//! Usage: `foldrun-runner <job-request.json>`
//!
//! Reads one job request, submits it to the configured backend and waits
//! until the job finishes. Exits non-zero unless the job succeeded.

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foldrun_runner::shutdown::install_shutdown_handler;
use foldrun_runner::{Config, JobRequest, run_request};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foldrun_runner=info,foldrun_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Foldrun Runner");

    let config = Config::load()?;
    info!(
        "Loaded configuration: backend={:?}, poll_interval={:?}, retry_limit={}",
        config.backend, config.poll_interval, config.retry_limit
    );

    let request_path = std::env::args()
        .nth(1)
        .context("usage: foldrun-runner <job-request.json>")?;
    let request = JobRequest::from_path(&request_path)?;

    let shutdown = install_shutdown_handler();

    match run_request(&config, &request, &shutdown).await {
        Ok(outcome) => {
            info!(
                "Job {} finished in state {} after {} status queries",
                outcome.handle, outcome.state, outcome.queries
            );
            Ok(())
        }
        Err(e) => {
            error!("Job failed: {}", e);
            Err(e).context(format!("Job request {} did not succeed", request_path))
        }
    }
}
