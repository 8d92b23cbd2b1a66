//! Foldrun Core
//!
//! Core types and abstractions for running pipeline steps as remote batch jobs.
//!
//! This crate contains:
//! - Domain types: job specs, handles, states and per-tool profiles
//! - Builder: pure construction of a validated `JobSpec`
//! - DTOs: wire payloads exchanged with the batch backend

pub mod builder;
pub mod domain;
pub mod dto;
pub mod error;

pub use builder::JobSpecBuilder;
pub use error::SpecError;
