//! Job spec builder
//!
//! Pure translation of resource parameters into a validated `JobSpec`.
//! Building performs no I/O; identical parameters always give an equal spec.

use std::collections::BTreeMap;

use crate::domain::spec::{
    Accelerator, BootDisk, ContainerSpec, JobSpec, NetworkMount, WorkerPoolSpec,
};
use crate::error::SpecError;

const DEFAULT_MACHINE_TYPE: &str = "n1-standard-8";
const SCRIPT_INTERPRETER: &str = "python";

#[derive(Debug, Clone)]
pub struct JobSpecBuilder {
    display_name: Option<String>,
    machine_type: String,
    boot_disk: BootDisk,
    accelerator: Option<Accelerator>,
    image: Option<String>,
    command: Vec<String>,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    mount_server: Option<String>,
    mount_path: Option<String>,
    mount_point: Option<String>,
    network: Option<String>,
}

impl Default for JobSpecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSpecBuilder {
    pub fn new() -> Self {
        Self {
            display_name: None,
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            boot_disk: BootDisk::default(),
            accelerator: None,
            image: None,
            command: Vec::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            mount_server: None,
            mount_path: None,
            mount_point: None,
            network: None,
        }
    }

    /// Builder for a job that runs `script` with the container's Python
    pub fn for_script(script: impl Into<String>) -> Self {
        Self::new()
            .command([SCRIPT_INTERPRETER])
            .args([script.into()])
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn machine_type(mut self, machine_type: impl Into<String>) -> Self {
        self.machine_type = machine_type.into();
        self
    }

    pub fn boot_disk_type(mut self, disk_type: impl Into<String>) -> Self {
        self.boot_disk.disk_type = disk_type.into();
        self
    }

    pub fn boot_disk_size_gb(mut self, size_gb: u32) -> Self {
        self.boot_disk.size_gb = size_gb;
        self
    }

    pub fn accelerator(mut self, accelerator_type: impl Into<String>, count: u32) -> Self {
        self.accelerator = Some(Accelerator {
            accelerator_type: accelerator_type.into(),
            count,
        });
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Appends arguments after any already set
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn mount_server(mut self, server: impl Into<String>) -> Self {
        self.mount_server = Some(server.into());
        self
    }

    pub fn mount_path(mut self, path: impl Into<String>) -> Self {
        self.mount_path = Some(path.into());
        self
    }

    pub fn mount_point(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = Some(mount_point.into());
        self
    }

    /// Sets all three mount fields at once
    pub fn network_mount(self, mount: NetworkMount) -> Self {
        self.mount_server(mount.server)
            .mount_path(mount.remote_path)
            .mount_point(mount.mount_point)
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Validates the parameters and produces the spec
    pub fn build(&self) -> Result<JobSpec, SpecError> {
        let display_name =
            non_empty(self.display_name.as_deref()).ok_or(SpecError::Missing("display name"))?;
        let image =
            non_empty(self.image.as_deref()).ok_or(SpecError::Missing("container image"))?;

        if self.command.is_empty() || self.command.iter().all(|c| c.trim().is_empty()) {
            return Err(SpecError::Missing("container command"));
        }

        if self.machine_type.trim().is_empty() {
            return Err(SpecError::Invalid("machine type cannot be empty".to_string()));
        }

        if self.boot_disk.size_gb == 0 {
            return Err(SpecError::Invalid(
                "boot disk size must be greater than 0".to_string(),
            ));
        }

        if let Some(accelerator) = &self.accelerator {
            if accelerator.count == 0 {
                return Err(SpecError::Invalid(format!(
                    "accelerator {} requires a count greater than 0",
                    accelerator.accelerator_type
                )));
            }
        }

        let network_mount = self.network_mount_spec()?;

        let container = ContainerSpec {
            image: image.to_string(),
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
        };

        let pool = WorkerPoolSpec {
            machine_type: self.machine_type.clone(),
            replica_count: 1,
            boot_disk: self.boot_disk.clone(),
            accelerator: self.accelerator.clone(),
            network_mount,
            container,
        };

        Ok(JobSpec {
            display_name: display_name.to_string(),
            worker_pools: vec![pool],
            network: non_empty(self.network.as_deref()).map(str::to_string),
        })
    }

    fn network_mount_spec(&self) -> Result<Option<NetworkMount>, SpecError> {
        let server = non_empty(self.mount_server.as_deref());
        let path = non_empty(self.mount_path.as_deref());
        let point = non_empty(self.mount_point.as_deref());

        match (server, path, point) {
            (Some(server), Some(path), Some(point)) => Ok(Some(NetworkMount {
                server: server.to_string(),
                remote_path: path.to_string(),
                mount_point: point.to_string(),
            })),
            (None, None, None) => Ok(None),
            _ => {
                let present: Vec<&str> = [
                    ("server", server.is_some()),
                    ("path", path.is_some()),
                    ("mount point", point.is_some()),
                ]
                .into_iter()
                .filter_map(|(field, set)| set.then_some(field))
                .collect();
                Err(SpecError::PartialMount(present.join(", ")))
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_builder() -> JobSpecBuilder {
        JobSpecBuilder::new()
            .display_name("search-uniref90")
            .machine_type("n1-standard-8")
            .image("tool:latest")
            .command(["run"])
            .args(["--db", "uniref90"])
    }

    #[test]
    fn test_build_minimal_spec() {
        let spec = search_builder().build().unwrap();

        assert_eq!(spec.display_name(), "search-uniref90");
        assert_eq!(spec.worker_pools().len(), 1);
        assert_eq!(spec.network(), None);

        let pool = spec.primary_pool();
        assert_eq!(pool.machine_type(), "n1-standard-8");
        assert_eq!(pool.replica_count(), 1);
        assert_eq!(pool.boot_disk(), &BootDisk::default());
        assert!(pool.network_mount().is_none());
        assert_eq!(pool.container().image(), "tool:latest");
        assert_eq!(pool.container().args(), ["--db", "uniref90"]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = search_builder()
            .env("B_VAR", "2")
            .env("A_VAR", "1")
            .mount_server("10.0.0.2")
            .mount_path("/datasets")
            .mount_point("/mnt/nfs/alphafold");

        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first, second);

        let names: Vec<&String> = first.primary_pool().container().env().keys().collect();
        assert_eq!(names, ["A_VAR", "B_VAR"]);
    }

    #[test]
    fn test_missing_image_fails() {
        let err = JobSpecBuilder::new()
            .display_name("no-image")
            .command(["run"])
            .build()
            .unwrap_err();
        assert_eq!(err, SpecError::Missing("container image"));
    }

    #[test]
    fn test_missing_command_fails() {
        let err = JobSpecBuilder::new()
            .display_name("no-command")
            .image("tool:latest")
            .build()
            .unwrap_err();
        assert_eq!(err, SpecError::Missing("container command"));
    }

    #[test]
    fn test_partial_mount_fails() {
        let err = search_builder()
            .mount_server("10.0.0.2")
            .mount_point("/mnt/nfs")
            .build()
            .unwrap_err();
        assert_eq!(err, SpecError::PartialMount("server, mount point".to_string()));
    }

    #[test]
    fn test_complete_mount_and_network() {
        let spec = search_builder()
            .network_mount(NetworkMount {
                server: "10.0.0.2".to_string(),
                remote_path: "/datasets_v1".to_string(),
                mount_point: "/mnt/nfs/alphafold".to_string(),
            })
            .network("projects/123/global/networks/default")
            .build()
            .unwrap();

        let mount = spec.primary_pool().network_mount().unwrap();
        assert_eq!(mount.server, "10.0.0.2");
        assert_eq!(mount.remote_path, "/datasets_v1");
        assert_eq!(spec.network(), Some("projects/123/global/networks/default"));
    }

    #[test]
    fn test_for_script() {
        let spec = JobSpecBuilder::for_script("/scripts/task.py")
            .display_name("script-job")
            .image("gcr.io/project/image")
            .args(["--sleep_time=120"])
            .build()
            .unwrap();

        let container = spec.primary_pool().container();
        assert_eq!(container.command(), ["python"]);
        assert_eq!(container.args(), ["/scripts/task.py", "--sleep_time=120"]);
    }

    #[test]
    fn test_invalid_resources() {
        assert!(search_builder().boot_disk_size_gb(0).build().is_err());
        assert!(search_builder().machine_type(" ").build().is_err());
        assert!(search_builder().accelerator("NVIDIA_TESLA_T4", 0).build().is_err());
        assert!(search_builder().display_name("").build().is_err());
    }
}
