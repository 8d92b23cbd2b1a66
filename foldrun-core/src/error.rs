//! Error types for job specification

use thiserror::Error;

/// Errors raised while assembling a job specification
///
/// These are always surfaced before any job is created remotely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// A required parameter was not provided
    #[error("Invalid job configuration: missing {0}")]
    Missing(&'static str),

    /// A parameter was provided but is unusable
    #[error("Invalid job configuration: {0}")]
    Invalid(String),

    /// Only some of the network mount fields were provided
    #[error("Invalid job configuration: network mount requires server, path and mount point together (got {0})")]
    PartialMount(String),

    /// Tool name not present in the profile table
    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),
}
