//! Runner configuration
//!
//! Defines all configurable parameters for the runner: which backend jobs
//! go to, how to reach it, and how often to poll.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::backend::LocalTool;
use crate::backend::batch::{BatchEndpoint, TokenSource};
use crate::scheduler::PollSettings;

/// Where jobs are submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// The HTTP custom job API
    Batch,
    /// The command-line batch tool, run as subprocesses
    Local,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(Self::Batch),
            "local" => Ok(Self::Local),
            other => anyhow::bail!("unknown backend '{}', expected batch or local", other),
        }
    }
}

/// How the local backend waits for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalWaitMode {
    /// The submit tool blocks until the job ends; its exit code is the result
    Tool,
    /// The job is submitted detached and polled through the status tool
    Poll,
}

impl FromStr for LocalWaitMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tool" | "wait" => Ok(Self::Tool),
            "poll" => Ok(Self::Poll),
            other => anyhow::bail!("unknown local wait mode '{}', expected tool or poll", other),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,

    /// Batch API base URL (e.g., "https://us-central1-aiplatform.googleapis.com/v1")
    pub api_url: String,

    /// Resource parent jobs are created under (e.g., "projects/p/locations/us-central1")
    pub parent: String,

    /// Bearer token sent with batch API requests
    pub api_token: TokenSource,

    /// Network peered with the job, applied when a request names none
    pub network: Option<String>,

    /// Pause between status queries of a running job
    pub poll_interval: Duration,

    /// Consecutive connection errors tolerated while polling
    pub retry_limit: u32,

    pub local: LocalTool,
    pub local_wait_mode: LocalWaitMode,
}

impl Config {
    /// Creates a new configuration with defaults for the given backend
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            api_url: "https://us-central1-aiplatform.googleapis.com/v1".to_string(),
            parent: String::new(),
            api_token: TokenSource::None,
            network: None,
            poll_interval: default_poll_interval(backend),
            retry_limit: 5,
            local: LocalTool::default(),
            local_wait_mode: LocalWaitMode::Tool,
        }
    }

    /// Loads and validates configuration from the process environment
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads and validates configuration through `lookup`
    pub fn load_with<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::from_lookup(lookup).context("Invalid FOLDRUN_* environment")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Creates configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from variables returned by `lookup`
    ///
    /// Expected variables:
    /// - FOLDRUN_BACKEND (optional, batch|local, default: local)
    /// - FOLDRUN_API_URL (optional)
    /// - FOLDRUN_PARENT (required for the batch backend)
    /// - FOLDRUN_API_TOKEN_FILE (optional, re-read for every new client)
    /// - FOLDRUN_API_TOKEN (optional, ignored when a token file is set)
    /// - FOLDRUN_NETWORK (optional)
    /// - FOLDRUN_POLL_INTERVAL (optional, seconds, default: 60 batch / 15 local)
    /// - FOLDRUN_RETRY_LIMIT (optional, default: 5)
    /// - FOLDRUN_LOCAL_PROVIDER (optional, default: local)
    /// - FOLDRUN_LOCAL_PROJECT, FOLDRUN_LOCAL_REGIONS (optional)
    /// - FOLDRUN_LOCAL_LOGGING, FOLDRUN_LOCAL_LOG_INTERVAL (optional)
    /// - FOLDRUN_LOCAL_WAIT_MODE (optional, tool|poll, default: tool)
    /// - FOLDRUN_SUBMIT_BIN, FOLDRUN_STATUS_BIN, FOLDRUN_DELETE_BIN (optional)
    ///
    /// Empty values count as unset. Any other value that does not parse is
    /// an error.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match var("FOLDRUN_BACKEND") {
            Some(value) => value.parse()?,
            None => Backend::Local,
        };

        let mut config = Self::new(backend);

        if let Some(api_url) = var("FOLDRUN_API_URL") {
            config.api_url = api_url;
        }
        if let Some(parent) = var("FOLDRUN_PARENT") {
            config.parent = parent;
        }
        config.api_token = match (var("FOLDRUN_API_TOKEN_FILE"), var("FOLDRUN_API_TOKEN")) {
            (Some(path), _) => TokenSource::File(PathBuf::from(path)),
            (None, Some(token)) => TokenSource::Static(token),
            (None, None) => TokenSource::None,
        };
        config.network = var("FOLDRUN_NETWORK");

        if let Some(value) = var("FOLDRUN_POLL_INTERVAL") {
            let secs: u64 = value.trim().parse().with_context(|| {
                format!("FOLDRUN_POLL_INTERVAL must be whole seconds, got '{}'", value)
            })?;
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(value) = var("FOLDRUN_RETRY_LIMIT") {
            config.retry_limit = value.trim().parse().with_context(|| {
                format!("FOLDRUN_RETRY_LIMIT must be a count, got '{}'", value)
            })?;
        }

        if let Some(provider) = var("FOLDRUN_LOCAL_PROVIDER") {
            config.local.provider = provider;
        }
        config.local.project = var("FOLDRUN_LOCAL_PROJECT");
        config.local.regions = var("FOLDRUN_LOCAL_REGIONS");
        config.local.logging = var("FOLDRUN_LOCAL_LOGGING");
        config.local.log_interval = var("FOLDRUN_LOCAL_LOG_INTERVAL");
        if let Some(bin) = var("FOLDRUN_SUBMIT_BIN") {
            config.local.submit_bin = bin;
        }
        if let Some(bin) = var("FOLDRUN_STATUS_BIN") {
            config.local.status_bin = bin;
        }
        if let Some(bin) = var("FOLDRUN_DELETE_BIN") {
            config.local.delete_bin = bin;
        }
        if let Some(mode) = var("FOLDRUN_LOCAL_WAIT_MODE") {
            config.local_wait_mode = mode.parse()?;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval.as_secs() == 0 {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.retry_limit == 0 {
            anyhow::bail!("retry_limit must be greater than 0");
        }

        match self.backend {
            Backend::Batch => {
                if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
                    anyhow::bail!("api_url must start with http:// or https://");
                }

                if self.parent.is_empty() {
                    anyhow::bail!("parent cannot be empty for the batch backend");
                }
            }
            Backend::Local => {
                if self.local.provider.is_empty() {
                    anyhow::bail!("local provider cannot be empty");
                }

                if self.local.provider != "local" && self.local.project.is_none() {
                    anyhow::bail!(
                        "provider '{}' needs FOLDRUN_LOCAL_PROJECT",
                        self.local.provider
                    );
                }

                for bin in [
                    &self.local.submit_bin,
                    &self.local.status_bin,
                    &self.local.delete_bin,
                ] {
                    if bin.is_empty() {
                        anyhow::bail!("local tool binaries cannot be empty");
                    }
                }
            }
        }

        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
            retry_limit: self.retry_limit,
        }
    }

    pub fn batch_endpoint(&self) -> BatchEndpoint {
        BatchEndpoint {
            base_url: self.api_url.clone(),
            parent: self.parent.clone(),
            token: self.api_token.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Backend::Local)
    }
}

fn default_poll_interval(backend: Backend) -> Duration {
    match backend {
        Backend::Batch => Duration::from_secs(60),
        Backend::Local => Duration::from_secs(15),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.local_wait_mode, LocalWaitMode::Tool);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_defaults() {
        let config = Config::new(Backend::Batch);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(
            config.poll_settings(),
            PollSettings {
                interval: Duration::from_secs(60),
                retry_limit: 5,
            }
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new(Backend::Batch);

        // No parent yet
        assert!(config.validate().is_err());

        config.parent = "projects/p/locations/us-central1".to_string();
        assert!(config.validate().is_ok());

        // Invalid URL should fail
        config.api_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.api_url = "http://localhost:8080/v1".to_string();
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.poll_interval = Duration::from_secs(1);

        config.retry_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_provider_needs_project() {
        let mut config = Config::default();
        config.local.provider = "google-cls-v2".to_string();
        assert!(config.validate().is_err());

        config.local.project = Some("my-project".to_string());
        assert!(config.validate().is_ok());

        config.local.status_bin = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_backend_and_wait_mode() {
        assert_eq!("batch".parse::<Backend>().unwrap(), Backend::Batch);
        assert_eq!(" Local ".parse::<Backend>().unwrap(), Backend::Local);
        assert!("cloud".parse::<Backend>().is_err());

        assert_eq!("poll".parse::<LocalWaitMode>().unwrap(), LocalWaitMode::Poll);
        assert_eq!("TOOL".parse::<LocalWaitMode>().unwrap(), LocalWaitMode::Tool);
        assert!("sometimes".parse::<LocalWaitMode>().is_err());
    }

    #[test]
    fn test_batch_endpoint_carries_token() {
        let mut config = Config::new(Backend::Batch);
        config.parent = "projects/p/locations/l".to_string();
        config.api_token = TokenSource::Static("secret".to_string());

        let endpoint = config.batch_endpoint();
        assert_eq!(endpoint.parent, "projects/p/locations/l");
        assert_eq!(endpoint.token, TokenSource::Static("secret".to_string()));
    }

    #[test]
    fn test_batch_config_from_variables() {
        let config = Config::load_with(lookup(&[
            ("FOLDRUN_BACKEND", "batch"),
            ("FOLDRUN_PARENT", "projects/p/locations/l"),
            ("FOLDRUN_API_TOKEN", "static-token"),
            ("FOLDRUN_API_TOKEN_FILE", "/var/run/foldrun/token"),
            ("FOLDRUN_POLL_INTERVAL", "30"),
            ("FOLDRUN_NETWORK", ""),
        ]))
        .unwrap();

        assert_eq!(config.backend, Backend::Batch);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.network, None);
        assert_eq!(
            config.api_token,
            TokenSource::File(PathBuf::from("/var/run/foldrun/token"))
        );
    }

    #[test]
    fn test_malformed_variables_are_errors() {
        // must not quietly become a local-backend config
        let err = Config::load_with(lookup(&[
            ("FOLDRUN_BACKEND", "batch"),
            ("FOLDRUN_PARENT", "projects/p/locations/l"),
            ("FOLDRUN_LOCAL_WAIT_MODE", "polling"),
        ]))
        .unwrap_err();
        assert!(format!("{err:#}").contains("polling"));

        let err = Config::from_lookup(lookup(&[("FOLDRUN_POLL_INTERVAL", "1m")])).unwrap_err();
        assert!(err.to_string().contains("FOLDRUN_POLL_INTERVAL"));

        assert!(Config::from_lookup(lookup(&[("FOLDRUN_RETRY_LIMIT", "-1")])).is_err());
        assert!(Config::from_lookup(lookup(&[("FOLDRUN_BACKEND", "cloud")])).is_err());

        // a batch backend without a parent fails validation
        assert!(Config::load_with(lookup(&[("FOLDRUN_BACKEND", "batch")])).is_err());
    }
}
