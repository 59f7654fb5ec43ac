use std::sync::Arc;

use codereel_codegen::ChatCompletionsApi;
use codereel_core::job::JobStore;
use codereel_pipeline::Pipeline;

use crate::config::ServerConfig;

/// The pipeline as wired for the HTTP server.
pub type AppPipeline = Pipeline<ChatCompletionsApi>;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// In-memory job table shared with running jobs and the sweeper.
    pub store: Arc<JobStore>,
    pub pipeline: Arc<AppPipeline>,
}
