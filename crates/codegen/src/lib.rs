//! Code generation for render jobs.
//!
//! Sends the user's prompt together with a fixed per-engine instruction
//! block to a chat-completions API, strips markdown fences from the reply
//! and validates its shape before anything is rendered. The remote call is
//! made once; there is no retry.

pub mod api;
pub mod generator;
pub mod prompts;
pub mod validate;

pub use api::{ChatCompletionsApi, CodegenSettings, CompletionBackend};
pub use generator::{CodeGenerator, CodegenRequest};

/// Errors from code generation.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("No API key provided for code generation")]
    MissingApiKey,

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("Code generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Code generation API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Code generation API returned no content")]
    EmptyResponse,

    /// The generated code does not have the shape the renderer expects.
    #[error("Generated {engine} code failed validation: expected {expected}")]
    ShapeMismatch {
        engine: codereel_core::types::Engine,
        expected: &'static str,
    },

    /// The generated code uses a construct known to break the renderer.
    #[error("Generated code uses a banned construct `{pattern}`: {reason}")]
    BannedConstruct {
        pattern: String,
        reason: &'static str,
    },
}

impl CodegenError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::EmptyPrompt => "empty_prompt",
            Self::Request(_) | Self::Api { .. } | Self::EmptyResponse => "codegen_failed",
            Self::ShapeMismatch { .. } => "invalid_code_shape",
            Self::BannedConstruct { .. } => "banned_construct",
        }
    }
}
