use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codereel_codegen::{ChatCompletionsApi, CodeGenerator, CodegenSettings};
use codereel_detect::ToolContext;
use codereel_pipeline::Pipeline;
use codereel_render::RenderSettings;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    // stdout carries the protocol, so diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codereel_ipc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- Configuration ---
    let render_settings = RenderSettings::from_env().expect("Invalid render configuration");
    let codegen_settings = CodegenSettings::from_env().expect("Invalid codegen configuration");

    // --- Pipeline ---
    let tools = Arc::new(ToolContext::from_process());
    let default_api_key = codegen_settings.default_api_key.clone();
    let generator = CodeGenerator::new(ChatCompletionsApi::new(codegen_settings), default_api_key);
    let pipeline = Arc::new(Pipeline::new(generator, render_settings, tools));

    tracing::info!("IPC server reading requests from stdin");
    if let Err(e) = codereel_ipc::serve(pipeline, tokio::io::stdin(), tokio::io::stdout()).await {
        tracing::error!(error = %e, "IPC server stopped on I/O error");
        std::process::exit(1);
    }
    tracing::info!("Input closed, IPC server exiting");
}
