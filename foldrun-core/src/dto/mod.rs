//! Data Transfer Objects for the batch backend
//!
//! DTOs mirror the backend's JSON field names exactly. Domain types are
//! converted into them at the edge, right before a request is sent.

pub mod job;
