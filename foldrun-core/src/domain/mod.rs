//! Core domain types
//!
//! This module contains the structures shared between the submission side
//! (which builds and sends specs) and the polling side (which tracks handles
//! until a terminal state).

pub mod job;
pub mod spec;
pub mod tool;

pub use job::{JobHandle, JobOutcome, JobState};
pub use spec::{
    Accelerator, BootDisk, ContainerSpec, FileBindings, JobSpec, NetworkMount, WorkerPoolSpec,
};
pub use tool::ToolProfile;
