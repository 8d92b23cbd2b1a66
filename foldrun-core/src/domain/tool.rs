//! Per-tool job settings
//!
//! Each search tool needs a different machine shape, CPU count, output
//! format and runner script. They are kept in one typed table so a tool name
//! is validated once, when the profile is parsed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::builder::JobSpecBuilder;
use crate::error::SpecError;

const MSA_RUNNER_SCRIPT: &str = "/scripts/alphafold_runners/msa_runner.py";
const TEMPLATE_RUNNER_SCRIPT: &str = "/scripts/alphafold_runners/hhsearch_runner.py";
const OUTPUT_FILE_PREFIX: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolProfile {
    Jackhmmer,
    Hhblits,
    Hhsearch,
}

impl ToolProfile {
    pub const ALL: [ToolProfile; 3] = [
        ToolProfile::Jackhmmer,
        ToolProfile::Hhblits,
        ToolProfile::Hhsearch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolProfile::Jackhmmer => "jackhmmer",
            ToolProfile::Hhblits => "hhblits",
            ToolProfile::Hhsearch => "hhsearch",
        }
    }

    pub fn machine_type(self) -> &'static str {
        match self {
            ToolProfile::Jackhmmer => "n1-standard-8",
            ToolProfile::Hhblits | ToolProfile::Hhsearch => "c2-standard-8",
        }
    }

    pub fn boot_disk_size_gb(self) -> u32 {
        200
    }

    pub fn cpu_count(self) -> u32 {
        match self {
            ToolProfile::Jackhmmer | ToolProfile::Hhblits => 6,
            ToolProfile::Hhsearch => 8,
        }
    }

    /// File extension of the tool's primary output
    pub fn output_format(self) -> &'static str {
        match self {
            ToolProfile::Jackhmmer => "sto",
            ToolProfile::Hhblits => "a3m",
            ToolProfile::Hhsearch => "hhr",
        }
    }

    /// Runner script executed inside the container
    pub fn script(self) -> &'static str {
        match self {
            ToolProfile::Jackhmmer | ToolProfile::Hhblits => MSA_RUNNER_SCRIPT,
            ToolProfile::Hhsearch => TEMPLATE_RUNNER_SCRIPT,
        }
    }

    /// Environment variables every job for this tool carries
    pub fn env(self) -> Vec<(&'static str, String)> {
        let mut env = vec![("N_CPU", self.cpu_count().to_string())];
        match self {
            ToolProfile::Jackhmmer => {
                env.push(("MSA_TOOL", self.name().to_string()));
                env.push(("MAX_STO_SEQUENCES", "10_000".to_string()));
            }
            ToolProfile::Hhblits => {
                env.push(("MSA_TOOL", self.name().to_string()));
            }
            ToolProfile::Hhsearch => {
                env.push(("TEMPLATE_TOOL", self.name().to_string()));
                env.push(("MAXSEQ", "1_000_000".to_string()));
            }
        }
        env
    }

    /// Location of the tool's output file inside `dir`
    pub fn output_file(self, dir: &str) -> String {
        format!(
            "{}/{}.{}",
            dir.trim_end_matches('/'),
            OUTPUT_FILE_PREFIX,
            self.output_format()
        )
    }

    /// Starts a builder pre-populated with this tool's settings
    pub fn job_builder(self, image: impl Into<String>) -> JobSpecBuilder {
        let mut builder = JobSpecBuilder::for_script(self.script())
            .machine_type(self.machine_type())
            .boot_disk_size_gb(self.boot_disk_size_gb())
            .image(image);
        for (name, value) in self.env() {
            builder = builder.env(name, value);
        }
        builder
    }
}

impl fmt::Display for ToolProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolProfile {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ToolProfile::ALL
            .into_iter()
            .find(|tool| tool.name() == wanted)
            .ok_or_else(|| SpecError::UnsupportedTool(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tools() {
        assert_eq!("jackhmmer".parse::<ToolProfile>(), Ok(ToolProfile::Jackhmmer));
        assert_eq!("HHblits".parse::<ToolProfile>(), Ok(ToolProfile::Hhblits));
        assert_eq!(" hhsearch ".parse::<ToolProfile>(), Ok(ToolProfile::Hhsearch));
    }

    #[test]
    fn test_parse_unknown_tool() {
        let err = "blast".parse::<ToolProfile>().unwrap_err();
        assert_eq!(err, SpecError::UnsupportedTool("blast".to_string()));
    }

    #[test]
    fn test_output_file() {
        assert_eq!(
            ToolProfile::Jackhmmer.output_file("gs://bucket/msas/"),
            "gs://bucket/msas/output.sto"
        );
        assert_eq!(
            ToolProfile::Hhsearch.output_file("/tmp/out"),
            "/tmp/out/output.hhr"
        );
    }

    #[test]
    fn test_job_builder_uses_profile() {
        let spec = ToolProfile::Hhblits
            .job_builder("gcr.io/project/alphafold")
            .display_name("hhblits-search")
            .env("DATABASE_PATHS", "bfd/bfd")
            .build()
            .unwrap();

        let pool = spec.primary_pool();
        assert_eq!(pool.machine_type(), "c2-standard-8");
        assert_eq!(pool.boot_disk().size_gb, 200);
        assert_eq!(pool.container().command(), ["python".to_string()]);
        assert_eq!(pool.container().args(), [MSA_RUNNER_SCRIPT.to_string()]);

        let env = pool.container().env();
        assert_eq!(env.get("MSA_TOOL").map(String::as_str), Some("hhblits"));
        assert_eq!(env.get("N_CPU").map(String::as_str), Some("6"));
        assert_eq!(env.get("DATABASE_PATHS").map(String::as_str), Some("bfd/bfd"));
    }
}
