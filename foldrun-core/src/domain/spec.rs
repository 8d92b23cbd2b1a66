//! Declarative job description
//!
//! A `JobSpec` is produced by `JobSpecBuilder` and never mutated afterwards;
//! fields are read through accessors only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete description of one remote job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    pub(crate) display_name: String,
    pub(crate) worker_pools: Vec<WorkerPoolSpec>,
    pub(crate) network: Option<String>,
}

impl JobSpec {
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Worker pools in submission order
    pub fn worker_pools(&self) -> &[WorkerPoolSpec] {
        &self.worker_pools
    }

    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    /// The first (chief) worker pool
    ///
    /// The builder always produces at least one pool.
    pub fn primary_pool(&self) -> &WorkerPoolSpec {
        &self.worker_pools[0]
    }
}

/// One homogeneous compute group within a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerPoolSpec {
    pub(crate) machine_type: String,
    pub(crate) replica_count: u32,
    pub(crate) boot_disk: BootDisk,
    pub(crate) accelerator: Option<Accelerator>,
    pub(crate) network_mount: Option<NetworkMount>,
    pub(crate) container: ContainerSpec,
}

impl WorkerPoolSpec {
    pub fn machine_type(&self) -> &str {
        &self.machine_type
    }

    pub fn replica_count(&self) -> u32 {
        self.replica_count
    }

    pub fn boot_disk(&self) -> &BootDisk {
        &self.boot_disk
    }

    pub fn accelerator(&self) -> Option<&Accelerator> {
        self.accelerator.as_ref()
    }

    pub fn network_mount(&self) -> Option<&NetworkMount> {
        self.network_mount.as_ref()
    }

    pub fn container(&self) -> &ContainerSpec {
        &self.container
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootDisk {
    pub disk_type: String,
    pub size_gb: u32,
}

impl Default for BootDisk {
    fn default() -> Self {
        Self {
            disk_type: "pd-ssd".to_string(),
            size_gb: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accelerator {
    pub accelerator_type: String,
    pub count: u32,
}

/// NFS share mounted into every replica of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMount {
    pub server: String,
    pub remote_path: String,
    pub mount_point: String,
}

/// Container executed by each replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub(crate) image: String,
    pub(crate) command: Vec<String>,
    pub(crate) args: Vec<String>,
    pub(crate) env: BTreeMap<String, String>,
}

impl ContainerSpec {
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Environment variables, ordered by name
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

/// File and disk bindings understood by the local batch tool
///
/// Each entry maps an environment variable name inside the job to a remote
/// location; the tool localizes inputs, delocalizes outputs and attaches
/// disks before and after the script runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBindings {
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub disk_mounts: BTreeMap<String, String>,
}
