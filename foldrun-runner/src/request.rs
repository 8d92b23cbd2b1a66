//! Job requests
//!
//! A job request is the JSON document handed to the runner binary. It holds
//! builder parameters, an optional search tool whose profile seeds them, and
//! the file bindings used by the local backend.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use foldrun_core::domain::spec::{Accelerator, FileBindings, JobSpec};
use foldrun_core::domain::tool::ToolProfile;
use foldrun_core::{JobSpecBuilder, SpecError};
use serde::Deserialize;

use crate::backend::{LocalSubmitter, LocalTool};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobRequest {
    pub display_name: Option<String>,
    /// Search tool whose profile provides machine, disk, script and env
    pub tool: Option<String>,
    pub image: Option<String>,
    pub machine_type: Option<String>,
    pub boot_disk_type: Option<String>,
    pub boot_disk_size_gb: Option<u32>,
    pub accelerator: Option<Accelerator>,
    /// Script run with the container's interpreter when no command is given
    pub script: Option<String>,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub mount_server: Option<String>,
    pub mount_path: Option<String>,
    pub mount_point: Option<String>,
    pub network: Option<String>,
    /// Directory the tool writes its result file into; needs `tool`
    pub output_dir: Option<String>,
    pub bindings: FileBindings,
}

impl JobRequest {
    /// Reads a request from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job request {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse job request {}", path.display()))
    }

    /// Tool profile named by the request, if any
    pub fn profile(&self) -> Result<Option<ToolProfile>, SpecError> {
        self.tool.as_deref().map(str::parse::<ToolProfile>).transpose()
    }

    /// Builder seeded with the tool profile and overridden by explicit fields
    ///
    /// # Arguments
    /// * `default_network` - Network used when the request names none
    pub fn builder(&self, default_network: Option<&str>) -> Result<JobSpecBuilder, SpecError> {
        let image = self.image.clone().unwrap_or_default();
        let profile = self.profile()?;
        let mut builder = match (profile, &self.script) {
            (Some(profile), _) => profile.job_builder(image),
            (None, Some(script)) => JobSpecBuilder::for_script(script.clone()).image(image),
            (None, None) => JobSpecBuilder::new().image(image),
        };

        match (profile, &self.output_dir) {
            (Some(profile), Some(dir)) => {
                builder = builder
                    .env("OUTPUT_DATA", profile.output_file(dir))
                    .env("OUTPUT_DATA_FORMAT", profile.output_format());
            }
            (None, Some(_)) => {
                return Err(SpecError::Invalid(
                    "output_dir is only meaningful for a search tool".to_string(),
                ));
            }
            (_, None) => {}
        }

        if let Some(name) = &self.display_name {
            builder = builder.display_name(name.clone());
        }
        if let Some(machine_type) = &self.machine_type {
            builder = builder.machine_type(machine_type.clone());
        }
        if let Some(disk_type) = &self.boot_disk_type {
            builder = builder.boot_disk_type(disk_type.clone());
        }
        if let Some(size) = self.boot_disk_size_gb {
            builder = builder.boot_disk_size_gb(size);
        }
        if let Some(accelerator) = &self.accelerator {
            builder = builder.accelerator(accelerator.accelerator_type.clone(), accelerator.count);
        }
        if !self.command.is_empty() {
            builder = builder.command(self.command.clone());
        }

        builder = builder.args(self.args.clone()).envs(self.env.clone());

        if let Some(server) = &self.mount_server {
            builder = builder.mount_server(server.clone());
        }
        if let Some(path) = &self.mount_path {
            builder = builder.mount_path(path.clone());
        }
        if let Some(point) = &self.mount_point {
            builder = builder.mount_point(point.clone());
        }
        if let Some(network) = self.network.as_deref().or(default_network) {
            builder = builder.network(network);
        }

        Ok(builder)
    }

    pub fn build_spec(&self, default_network: Option<&str>) -> Result<JobSpec, SpecError> {
        self.builder(default_network)?.build()
    }

    /// Submitter for the local backend carrying this request's bindings
    pub fn local_submitter(&self, tool: Arc<LocalTool>) -> LocalSubmitter {
        let submitter = LocalSubmitter::new(tool).with_bindings(self.bindings.clone());
        match &self.script {
            Some(script) if self.tool.is_none() => submitter.with_script(script.clone()),
            _ => submitter,
        }
    }
}
