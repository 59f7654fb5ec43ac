use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codereel_api::config::ServerConfig;
use codereel_api::router::build_app_router;
use codereel_api::state::AppState;
use codereel_codegen::{ChatCompletionsApi, CodeGenerator, CodegenSettings};
use codereel_core::job::{JobStore, JobStoreConfig};
use codereel_detect::ToolContext;
use codereel_pipeline::health::health_report;
use codereel_pipeline::{sweeper, Pipeline};
use codereel_render::RenderSettings;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codereel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    let render_settings = RenderSettings::from_env().expect("Invalid render configuration");
    let codegen_settings = CodegenSettings::from_env().expect("Invalid codegen configuration");
    let store_config = JobStoreConfig::from_env().expect("Invalid job store configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        media_root = %render_settings.media_root.display(),
        scripts_dir = %render_settings.scripts_dir.display(),
        "Loaded render configuration",
    );

    // --- Tools ---
    let tools = Arc::new(ToolContext::from_process());
    let startup_health = health_report(&tools, &render_settings, None).await;
    for report in &startup_health.engines {
        tracing::info!(
            engine = %report.engine,
            ready = report.ready,
            readiness_pct = report.readiness_pct,
            "Engine readiness at startup",
        );
    }

    // --- Pipeline ---
    let default_api_key = codegen_settings.default_api_key.clone();
    let generator = CodeGenerator::new(ChatCompletionsApi::new(codegen_settings), default_api_key);
    let pipeline = Arc::new(Pipeline::new(generator, render_settings, tools));

    // --- Job store + sweeper ---
    let store = Arc::new(JobStore::new(store_config));
    let sweeper_cancel = CancellationToken::new();
    let sweeper_handle = tokio::spawn(sweeper::run(
        Arc::clone(&store),
        config.job_sweep_interval,
        sweeper_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        pipeline,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweeper_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;
    tracing::info!("Job sweeper stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
