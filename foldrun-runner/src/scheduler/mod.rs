//! Scheduler layer for the runner
//!
//! This layer follows a submitted job to completion. The poller drives
//! status queries; the guard makes sure a job is cancelled when the wait
//! on it ends early.

pub mod guard;
pub mod poller;

pub use guard::CancellationGuard;
pub use poller::{JobPoller, PollSettings};
