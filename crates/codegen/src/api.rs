//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use std::future::Future;

use codereel_core::config::{env_opt, env_or, env_string, ConfigError};
use serde::{Deserialize, Serialize};

use crate::CodegenError;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Settings for the remote code generation API.
#[derive(Debug, Clone)]
pub struct CodegenSettings {
    /// Base URL; `/chat/completions` is appended.
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    /// Used when a request does not carry its own credential.
    pub default_api_key: Option<String>,
}

impl Default for CodegenSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            default_api_key: None,
        }
    }
}

impl CodegenSettings {
    /// | Env Var                | Default                     |
    /// |------------------------|-----------------------------|
    /// | `CODEGEN_API_URL`      | `https://api.openai.com/v1` |
    /// | `CODEGEN_MODEL`        | `gpt-4o-mini`               |
    /// | `CODEGEN_TEMPERATURE`  | `0.2`                       |
    /// | `CODEGEN_API_KEY`      | unset                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: env_string("CODEGEN_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            model: env_string("CODEGEN_MODEL", DEFAULT_MODEL),
            temperature: env_or("CODEGEN_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            default_api_key: env_opt("CODEGEN_API_KEY"),
        })
    }
}

/// Something that turns a system + user message into one text reply.
pub trait CompletionBackend: Send + Sync {
    fn complete(
        &self,
        system: &str,
        user: &str,
        api_key: &str,
    ) -> impl Future<Output = Result<String, CodegenError>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice, if non-empty.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
    }
}

/// [`CompletionBackend`] backed by [`reqwest`].
pub struct ChatCompletionsApi {
    client: reqwest::Client,
    settings: CodegenSettings,
}

impl ChatCompletionsApi {
    pub fn new(settings: CodegenSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, settings: CodegenSettings) -> Self {
        Self { client, settings }
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CodegenError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CodegenError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl CompletionBackend for ChatCompletionsApi {
    async fn complete(&self, system: &str, user: &str, api_key: &str) -> Result<String, CodegenError> {
        let body = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.settings.api_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: ChatResponse = Self::ensure_success(response).await?.json().await?;
        parsed.into_content().ok_or(CodegenError::EmptyResponse)
    }
}
