//! Domain types and pure logic shared by every codereel crate.
//!
//! Nothing in here touches the network or spawns processes. The job
//! store is in-memory and async-locked so both request surfaces can
//! share it.

pub mod artifact;
pub mod classify;
pub mod config;
pub mod error;
pub mod job;
pub mod log_sink;
pub mod readiness;
pub mod types;
