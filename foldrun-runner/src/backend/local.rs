//! Local batch tool backend
//!
//! Drives a command-line batch tool as subprocesses:
//! - the submit tool creates a job and prints its id (or blocks with `--wait`)
//! - the status tool lists the job's status as JSON
//! - the delete tool cancels the job
//!
//! Every invocation captures stdout and stderr so failures carry the tool's
//! own diagnostics.

use std::process::{ExitStatus, Output, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use foldrun_core::SpecError;
use foldrun_core::domain::job::{JobHandle, JobOutcome, JobState};
use foldrun_core::domain::spec::{FileBindings, JobSpec};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{JobCanceller, JobSubmitter, StatusClient, StatusClientFactory};
use crate::error::{JobError, StatusError};
use crate::scheduler::CancellationGuard;

/// Settings shared by every invocation of the local tools
#[derive(Debug, Clone)]
pub struct LocalTool {
    /// Execution provider passed as `--provider` (e.g., "local", "google-cls-v2")
    pub provider: String,
    pub project: Option<String>,
    pub regions: Option<String>,
    /// Location the tool writes job logs to
    pub logging: Option<String>,
    pub log_interval: Option<String>,
    pub submit_bin: String,
    pub status_bin: String,
    pub delete_bin: String,
}

impl Default for LocalTool {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            project: None,
            regions: None,
            logging: None,
            log_interval: None,
            submit_bin: "dsub".to_string(),
            status_bin: "dstat".to_string(),
            delete_bin: "ddel".to_string(),
        }
    }
}

impl LocalTool {
    /// Arguments selecting the provider and project, common to all tools
    fn provider_args(&self) -> Vec<String> {
        let mut args = vec!["--provider".to_string(), self.provider.clone()];
        if let Some(project) = &self.project {
            args.push("--project".to_string());
            args.push(project.clone());
        }
        args
    }
}

/// Submits one job through the submit tool
///
/// Carries the job's file bindings and script alongside the tool settings,
/// so each job gets its own submitter.
pub struct LocalSubmitter {
    tool: Arc<LocalTool>,
    bindings: FileBindings,
    script: Option<String>,
}

impl LocalSubmitter {
    pub fn new(tool: Arc<LocalTool>) -> Self {
        Self {
            tool,
            bindings: FileBindings::default(),
            script: None,
        }
    }

    pub fn with_bindings(mut self, bindings: FileBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Runs `script` instead of the container command
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Flattens the spec into the submit tool's argument list
    pub fn submit_args(&self, spec: &JobSpec) -> Result<Vec<String>, JobError> {
        let pool = spec.primary_pool();
        if pool.network_mount().is_some() {
            return Err(SpecError::Invalid(
                "network mounts are not supported by the local batch tool".to_string(),
            )
            .into());
        }

        let container = pool.container();
        if let Some(script) = &self.script {
            let extra = script_arguments(container.args(), script);
            if !extra.is_empty() {
                return Err(SpecError::Invalid(format!(
                    "the local batch tool cannot pass arguments to --script {} (got {})",
                    script,
                    extra.join(" ")
                ))
                .into());
            }
        }

        let mut args = self.tool.provider_args();
        let mut flag = |name: &str, value: String| {
            args.push(format!("--{}", name));
            args.push(value);
        };

        if let Some(regions) = &self.tool.regions {
            flag("regions", regions.clone());
        }
        if let Some(logging) = &self.tool.logging {
            flag("logging", logging.clone());
        }
        if let Some(interval) = &self.tool.log_interval {
            flag("log-interval", interval.clone());
        }

        flag("name", spec.display_name().to_string());
        flag("machine-type", pool.machine_type().to_string());
        flag("boot-disk-size", pool.boot_disk().size_gb.to_string());
        if let Some(accelerator) = pool.accelerator() {
            flag("accelerator-type", accelerator.accelerator_type.clone());
            flag("accelerator-count", accelerator.count.to_string());
        }
        if let Some(network) = spec.network() {
            flag("network", network.to_string());
        }

        flag("image", container.image().to_string());
        for (name, value) in container.env() {
            flag("env", format!("{}={}", name, value));
        }
        for (name, uri) in &self.bindings.inputs {
            flag("input", format!("{}={}", name, uri));
        }
        for (name, uri) in &self.bindings.outputs {
            flag("output", format!("{}={}", name, uri));
        }
        for (name, disk) in &self.bindings.disk_mounts {
            flag("mount", format!("{}={}", name, disk));
        }

        match &self.script {
            Some(script) => flag("script", script.clone()),
            None => {
                let words: Vec<String> = container
                    .command()
                    .iter()
                    .chain(container.args())
                    .map(|word| shell_quote(word))
                    .collect();
                flag("command", words.join(" "));
            }
        }

        Ok(args)
    }

    /// Submits the job and blocks until the tool reports completion
    ///
    /// The tool prints the job id as soon as the job is created, then keeps
    /// running until the job ends. From that first line on, the wait runs
    /// under a `CancellationGuard`, so a shutdown sends the delete tool for
    /// the job before the submit tool is killed. The tool's exit code is the
    /// job result: zero is success, anything else is a failed job.
    pub async fn run_to_completion(
        &self,
        spec: &JobSpec,
        shutdown: &CancellationToken,
    ) -> Result<JobOutcome, JobError> {
        let mut args = self.submit_args(spec)?;
        args.push("--wait".to_string());
        args.push("--summary".to_string());

        let bin = &self.tool.submit_bin;
        info!(
            "Running job '{}' with {} and waiting for completion",
            spec.display_name(),
            bin
        );
        debug!("Executing {} with args {:?}", bin, args);

        let mut child = Command::new(bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| JobError::submission(format!("failed to run {}: {}", bin, e)))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(JobError::submission(format!("{} output was not captured", bin)));
        };
        let stderr = tokio::spawn(async move {
            let mut text = String::new();
            let mut stderr = stderr;
            if let Err(e) = stderr.read_to_string(&mut text).await {
                debug!("Failed to read submit tool stderr: {}", e);
            }
            text
        });
        let mut lines = BufReader::new(stdout).lines();

        let job_id = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Interrupted before {} reported a job id for '{}'", bin, spec.display_name());
                return Err(JobError::Interrupted { handle: JobHandle::new(spec.display_name()) });
            }
            line = first_line(&mut lines) => line,
        };

        let Some(job_id) = job_id else {
            // the tool ended without naming the job
            let handle = JobHandle::new(spec.display_name());
            return wait_for_exit(bin, &handle, &mut child, None, stderr).await;
        };

        let handle = JobHandle::new(job_id);
        info!("Job '{}' started as {}", spec.display_name(), handle);
        let canceller = Arc::new(LocalCanceller::new(Arc::clone(&self.tool)));
        let guard = CancellationGuard::arm(handle.clone(), canceller);
        guard
            .run(
                wait_for_exit(bin, &handle, &mut child, Some(lines), stderr),
                shutdown,
            )
            .await
    }
}

/// Returns arguments that follow the script reference in a container
fn script_arguments<'a>(args: &'a [String], script: &str) -> &'a [String] {
    match args.split_first() {
        Some((first, rest)) if first == script => rest,
        _ => args,
    }
}

/// First non-empty stdout line, or `None` once stdout closes
async fn first_line(lines: &mut Lines<BufReader<ChildStdout>>) -> Option<String> {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => return Some(line.trim().to_string()),
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read submit tool output: {}", e);
                return None;
            }
        }
    }
}

async fn wait_for_exit(
    bin: &str,
    handle: &JobHandle,
    child: &mut Child,
    lines: Option<Lines<BufReader<ChildStdout>>>,
    stderr: JoinHandle<String>,
) -> Result<JobOutcome, JobError> {
    if let Some(mut lines) = lines {
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("{}: {}", bin, line);
        }
    }

    let status = child.wait().await.map_err(|e| JobError::Query {
        handle: handle.clone(),
        message: format!("failed to wait for {}: {}", bin, e),
    })?;
    let stderr = stderr.await.unwrap_or_default();
    exit_outcome(bin, handle.clone(), status, stderr.trim())
}

fn exit_outcome(
    bin: &str,
    handle: JobHandle,
    status: ExitStatus,
    stderr: &str,
) -> Result<JobOutcome, JobError> {
    if !status.success() {
        let exit_code = status.code().unwrap_or(-1);
        error!(
            "{} exited with code {} for job {}: stderr='{}'",
            bin, exit_code, handle, stderr
        );
        return Err(JobError::JobExecution {
            handle,
            state: JobState::Failed,
            detail: Some(format!("exit_code={}, stderr='{}'", exit_code, stderr)),
        });
    }

    info!("Job {} completed successfully", handle);
    Ok(JobOutcome {
        handle,
        state: JobState::Succeeded,
        queries: 0,
        completed_at: chrono::Utc::now(),
    })
}

#[async_trait]
impl JobSubmitter for LocalSubmitter {
    async fn submit(&self, spec: &JobSpec) -> Result<JobHandle, JobError> {
        let args = self.submit_args(spec)?;

        debug!("Executing {} with args {:?}", self.tool.submit_bin, args);
        let output = run_tool(&self.tool.submit_bin, &args)
            .await
            .map_err(|e| {
                JobError::submission(format!("failed to run {}: {}", self.tool.submit_bin, e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            error!(
                "{} failed: exit_code={}, stdout='{}', stderr='{}'",
                self.tool.submit_bin, exit_code, stdout, stderr
            );
            return Err(JobError::Submission {
                message: format!("{} exited with code {}", self.tool.submit_bin, exit_code),
                stdout: Some(stdout),
                stderr: Some(stderr),
                body: None,
            });
        }

        if stdout.is_empty() {
            return Err(JobError::Submission {
                message: format!("{} did not print a job id", self.tool.submit_bin),
                stdout: Some(stdout),
                stderr: Some(stderr),
                body: None,
            });
        }

        info!("Submitted job '{}' as {}", spec.display_name(), stdout);
        Ok(JobHandle::new(stdout))
    }
}

/// One row of the status tool's JSON output
#[derive(Debug, Deserialize)]
struct StatusRecord {
    #[serde(rename = "job-id", default)]
    job_id: Option<String>,
    status: String,
    #[serde(rename = "status-message", default)]
    status_message: Option<String>,
}

/// Classifies the status tool's output
///
/// The tool is asked for every status, so a job it knows about always
/// appears. Empty output therefore means the job is gone, which is reported
/// as `NotFound` rather than guessed to be a success.
pub fn parse_status_output(stdout: &str) -> Result<JobState, StatusError> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Err(StatusError::NotFound);
    }

    let records: Vec<StatusRecord> = serde_json::from_str(stdout)
        .map_err(|e| StatusError::Fatal(format!("unparsable status output: {}", e)))?;
    let record = records.into_iter().next().ok_or(StatusError::NotFound)?;

    let state = match record.status.trim().to_ascii_uppercase().as_str() {
        "RUNNING" => JobState::Running,
        "SUCCESS" => JobState::Succeeded,
        "FAILURE" => JobState::Failed,
        "CANCELED" | "CANCELLED" => JobState::Cancelled,
        other => {
            return Err(StatusError::Fatal(format!("unknown status '{}'", other)));
        }
    };

    if state.is_terminal() {
        if let Some(message) = record.status_message.as_deref().filter(|m| !m.is_empty()) {
            debug!(
                "Job {} finished: {}",
                record.job_id.as_deref().unwrap_or("?"),
                message
            );
        }
    }

    Ok(state)
}

/// Queries job state through the status tool
pub struct LocalStatusClient {
    tool: Arc<LocalTool>,
}

impl LocalStatusClient {
    fn status_args(&self, handle: &JobHandle) -> Vec<String> {
        let mut args = self.tool.provider_args();
        args.extend([
            "--jobs".to_string(),
            handle.to_string(),
            "--status".to_string(),
            "*".to_string(),
            "--format".to_string(),
            "json".to_string(),
        ]);
        args
    }
}

#[async_trait]
impl StatusClient for LocalStatusClient {
    async fn query(&self, handle: &JobHandle) -> Result<JobState, StatusError> {
        let args = self.status_args(handle);
        let output = run_tool(&self.tool.status_bin, &args)
            .await
            .map_err(|e| {
                StatusError::Transient(format!("failed to run {}: {}", self.tool.status_bin, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StatusError::Fatal(format!(
                "{} exited with code {}: {}",
                self.tool.status_bin,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        parse_status_output(&String::from_utf8_lossy(&output.stdout))
    }
}

pub struct LocalStatusClientFactory {
    tool: Arc<LocalTool>,
}

impl LocalStatusClientFactory {
    pub fn new(tool: Arc<LocalTool>) -> Self {
        Self { tool }
    }
}

impl StatusClientFactory for LocalStatusClientFactory {
    fn create(&self) -> Arc<dyn StatusClient> {
        Arc::new(LocalStatusClient {
            tool: Arc::clone(&self.tool),
        })
    }
}

/// Cancels jobs through the delete tool
pub struct LocalCanceller {
    tool: Arc<LocalTool>,
}

impl LocalCanceller {
    pub fn new(tool: Arc<LocalTool>) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl JobCanceller for LocalCanceller {
    async fn cancel(&self, handle: &JobHandle) -> Result<(), JobError> {
        let mut args = self.tool.provider_args();
        args.push("--jobs".to_string());
        args.push(handle.to_string());

        let output = run_tool(&self.tool.delete_bin, &args)
            .await
            .map_err(|e| JobError::CancellationSend {
                handle: handle.clone(),
                message: format!("failed to run {}: {}", self.tool.delete_bin, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} failed for job {}: {}", self.tool.delete_bin, handle, stderr.trim());
            return Err(JobError::CancellationSend {
                handle: handle.clone(),
                message: format!(
                    "{} exited with code {}",
                    self.tool.delete_bin,
                    output.status.code().unwrap_or(-1)
                ),
            });
        }

        Ok(())
    }
}

async fn run_tool(bin: &str, args: &[String]) -> std::io::Result<Output> {
    let output = Command::new(bin)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        debug!("{} stderr: {}", bin, stderr.trim());
    }

    Ok(output)
}

/// Quotes a word for a POSIX shell when it needs it
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
