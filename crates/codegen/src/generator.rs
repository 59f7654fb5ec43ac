use codereel_core::types::Engine;

use crate::api::CompletionBackend;
use crate::prompts::{system_prompt, PromptParams};
use crate::validate::{strip_code_fences, validate};
use crate::CodegenError;

/// One code generation request.
#[derive(Debug, Clone, Copy)]
pub struct CodegenRequest<'a> {
    pub prompt: &'a str,
    pub engine: Engine,
    /// Per-request credential; falls back to the generator's default.
    pub api_key: Option<&'a str>,
    pub params: PromptParams,
}

/// Produces validated, fence-free code for an engine.
pub struct CodeGenerator<B> {
    backend: B,
    default_api_key: Option<String>,
}

impl<B: CompletionBackend> CodeGenerator<B> {
    pub fn new(backend: B, default_api_key: Option<String>) -> Self {
        Self {
            backend,
            default_api_key,
        }
    }

    /// Call the backend once and return code that passed validation.
    pub async fn generate(&self, request: &CodegenRequest<'_>) -> Result<String, CodegenError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(CodegenError::EmptyPrompt);
        }

        let api_key = request
            .api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or(self.default_api_key.as_deref())
            .ok_or(CodegenError::MissingApiKey)?;

        let system = system_prompt(request.engine, &request.params);
        let raw = self.backend.complete(&system, prompt, api_key).await?;

        let code = strip_code_fences(&raw);
        validate(request.engine, &code)?;

        tracing::debug!(
            engine = %request.engine,
            bytes = code.len(),
            "Generated code passed validation",
        );
        Ok(code)
    }
}
