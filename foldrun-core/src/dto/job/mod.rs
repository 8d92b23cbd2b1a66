//! Custom job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::JobState;
use crate::domain::spec::{JobSpec, WorkerPoolSpec};

/// Request body for creating a custom job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCustomJob {
    pub display_name: String,
    pub job_spec: CustomJobSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomJobSpec {
    pub worker_pool_specs: Vec<WorkerPoolSpecDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerPoolSpecDto {
    pub machine_spec: MachineSpec,
    pub replica_count: u32,
    pub disk_spec: DiskSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nfs_mounts: Vec<NfsMount>,
    pub container_spec: ContainerSpecDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    pub machine_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpec {
    pub boot_disk_type: String,
    pub boot_disk_size_gb: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NfsMount {
    pub server: String,
    pub path: String,
    pub mount_point: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpecDto {
    pub image_uri: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl From<&JobSpec> for CreateCustomJob {
    fn from(spec: &JobSpec) -> Self {
        Self {
            display_name: spec.display_name().to_string(),
            job_spec: CustomJobSpec {
                worker_pool_specs: spec.worker_pools().iter().map(Into::into).collect(),
                network: spec.network().map(str::to_string),
            },
        }
    }
}

impl From<&WorkerPoolSpec> for WorkerPoolSpecDto {
    fn from(pool: &WorkerPoolSpec) -> Self {
        let container = pool.container();
        Self {
            machine_spec: MachineSpec {
                machine_type: pool.machine_type().to_string(),
                accelerator_type: pool.accelerator().map(|a| a.accelerator_type.clone()),
                accelerator_count: pool.accelerator().map(|a| a.count),
            },
            replica_count: pool.replica_count(),
            disk_spec: DiskSpec {
                boot_disk_type: pool.boot_disk().disk_type.clone(),
                boot_disk_size_gb: pool.boot_disk().size_gb,
            },
            nfs_mounts: pool
                .network_mount()
                .map(|m| NfsMount {
                    server: m.server.clone(),
                    path: m.remote_path.clone(),
                    mount_point: m.mount_point.clone(),
                })
                .into_iter()
                .collect(),
            container_spec: ContainerSpecDto {
                image_uri: container.image().to_string(),
                command: container.command().to_vec(),
                args: container.args().to_vec(),
                env: container
                    .env()
                    .iter()
                    .map(|(name, value)| EnvVar {
                        name: name.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            },
        }
    }
}

/// Backend representation of a custom job
///
/// Only the fields the poller needs are kept; everything else in the
/// response body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomJob {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<JobErrorStatus>,
}

impl CustomJob {
    /// The job's state, or `None` if the backend reported an unknown one
    ///
    /// A response without a state is read as `JOB_STATE_UNSPECIFIED`.
    pub fn job_state(&self) -> Option<JobState> {
        JobState::from_wire(self.state.as_deref().unwrap_or("JOB_STATE_UNSPECIFIED"))
    }
}

/// Error detail attached to failed jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}
