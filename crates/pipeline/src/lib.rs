//! Job orchestration shared by the HTTP and IPC surfaces.
//!
//! [`Pipeline`] sequences code generation and rendering for one job,
//! [`health`] builds readiness reports from the tool detectors, and
//! [`logs`] turns a job's append-only log into a stream that ends with
//! the job outcome.

use codereel_codegen::CodegenError;
use codereel_core::error::CoreError;
use codereel_core::job::JobFailure;
use codereel_render::RenderError;

pub mod health;
pub mod logs;
pub mod run;
pub mod sweeper;

pub use run::{GenerateParams, Pipeline};

/// Any failure of a single job.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl PipelineError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Core(CoreError::InvalidEngine(_)) => "invalid_engine",
            Self::Core(CoreError::Validation(_)) => "validation_error",
            Self::Core(_) => "internal_error",
            Self::Codegen(e) => e.kind(),
            Self::Render(e) => e.kind(),
        }
    }

    pub fn to_failure(&self) -> JobFailure {
        JobFailure::new(self.kind(), self.to_string())
    }
}
