//! Locating the external executables the renderers depend on.
//!
//! Each tool is resolved by the same chain: environment override, then a
//! `PATH` lookup over candidate binary names, then (Chrome only) a list of
//! well-known install locations and, on Windows, the registry. Results are
//! cached in an explicit [`ToolContext`] built once at startup and passed
//! to whoever needs it; [`ToolContext::refresh`] drops the cache.

pub mod chrome;
pub mod context;
pub mod env;
pub mod search;
pub mod tool;

pub use context::ToolContext;
pub use env::DetectorEnv;
pub use tool::{detect, DetectError, DetectedTool, DetectionMethod, ToolKind};
