//! Request loop for the NDJSON surface.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use codereel_codegen::CompletionBackend;
use codereel_core::log_sink::LogSink;
use codereel_core::types::{Engine, RunId};
use codereel_pipeline::health::health_report;
use codereel_pipeline::{GenerateParams, Pipeline, PipelineError};

use crate::protocol::{
    CheckHealthParams, GenerateVideoParams, GenerateVideoResult, IpcErrorBody, IpcRequest,
    IpcResponse, LogEventMessage, METHOD_CHECK_HEALTH, METHOD_GENERATE_VIDEO,
};

/// Failure of a single request. Never ends the loop.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("Malformed request: {0}")]
    InvalidRequest(serde_json::Error),

    #[error("Invalid params for {method}: {source}")]
    InvalidParams {
        method: &'static str,
        source: serde_json::Error,
    },

    #[error("Unknown method `{0}`")]
    UnknownMethod(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to encode result: {0}")]
    Encode(serde_json::Error),
}

impl IpcError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidParams { .. } => "invalid_params",
            Self::UnknownMethod(_) => "unknown_method",
            Self::Pipeline(e) => e.kind(),
            Self::Encode(_) => "internal_error",
        }
    }

    fn to_body(&self) -> IpcErrorBody {
        IpcErrorBody::new(self.kind(), self.to_string())
    }
}

// ---------------------------------------------------------------------------
// Log sink
// ---------------------------------------------------------------------------

/// Pushes log lines for one request to the client as `log` events.
struct EventSink {
    id: Value,
    tx: mpsc::UnboundedSender<String>,
}

impl LogSink for EventSink {
    async fn log(&self, line: String) {
        tracing::debug!(id = %self.id, "{line}");
        if let Some(encoded) = encode(&LogEventMessage::new(&self.id, &line)) {
            // Receiver only goes away once the client output is closed.
            let _ = self.tx.send(encoded);
        }
    }
}

fn encode<T: Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode IPC message");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned + Default>(
    method: &'static str,
    raw: Value,
) -> Result<T, IpcError> {
    if raw.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(raw).map_err(|source| IpcError::InvalidParams { method, source })
}

async fn check_health<B: CompletionBackend>(
    pipeline: &Pipeline<B>,
    raw: Value,
) -> Result<Value, IpcError> {
    let params: CheckHealthParams = parse_params(METHOD_CHECK_HEALTH, raw)?;
    let engine = params
        .engine
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .map(str::parse::<Engine>)
        .transpose()
        .map_err(PipelineError::from)?;

    if params.refresh {
        pipeline.tools().refresh().await;
    }
    let report = health_report(pipeline.tools(), pipeline.settings(), engine).await;
    serde_json::to_value(report).map_err(IpcError::Encode)
}

async fn generate_video<B: CompletionBackend>(
    pipeline: &Pipeline<B>,
    raw: Value,
    sink: &EventSink,
) -> Result<Value, IpcError> {
    let params: GenerateVideoParams = serde_json::from_value(raw).map_err(|source| {
        IpcError::InvalidParams {
            method: METHOD_GENERATE_VIDEO,
            source,
        }
    })?;
    let params = GenerateParams::new(
        params.prompt,
        &params.engine,
        params.api_key,
        params.duration,
    )?;

    let run_id = RunId::generate();
    tracing::info!(run_id = %run_id, engine = %params.engine, "Generating video over IPC");

    let video = match pipeline.run(&run_id, &params, sink).await {
        Ok(video) => video,
        Err(e) => {
            sink.log(format!("Error: {e}")).await;
            return Err(e.into());
        }
    };
    sink.log(format!("Video ready: {}", video.url)).await;

    let result = GenerateVideoResult {
        video_path: video.path.display().to_string(),
        download_path: video.url,
        filename: video.file_name,
    };
    serde_json::to_value(result).map_err(IpcError::Encode)
}

async fn dispatch<B: CompletionBackend>(
    pipeline: &Pipeline<B>,
    request: IpcRequest,
    tx: &mpsc::UnboundedSender<String>,
) -> IpcResponse {
    let IpcRequest { id, method, params } = request;
    let result = match method.as_str() {
        METHOD_CHECK_HEALTH => check_health(pipeline, params).await,
        METHOD_GENERATE_VIDEO => {
            let sink = EventSink {
                id: id.clone(),
                tx: tx.clone(),
            };
            generate_video(pipeline, params, &sink).await
        }
        _ => Err(IpcError::UnknownMethod(method.clone())),
    };

    match result {
        Ok(value) => IpcResponse::ok(id, value),
        Err(e) => {
            tracing::warn!(id = %id, method = %method, kind = e.kind(), error = %e, "IPC request failed");
            IpcResponse::err(id, e.to_body())
        }
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Serve requests from `input` until it reaches EOF, writing every
/// message to `output` as one JSON line.
///
/// Requests run concurrently. Once input closes, in-flight requests are
/// allowed to finish before the writer is flushed and returned.
pub async fn serve<B, R, W>(pipeline: Arc<Pipeline<B>>, input: R, mut output: W) -> std::io::Result<W>
where
    B: CompletionBackend + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(output)
    });

    let mut lines = BufReader::new(input).lines();
    let mut in_flight = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<IpcRequest>(&line) {
            Ok(request) => request,
            Err(e) => {
                let e = IpcError::InvalidRequest(e);
                tracing::warn!(error = %e, "Rejected IPC line");
                if let Some(encoded) = encode(&IpcResponse::err(Value::Null, e.to_body())) {
                    let _ = tx.send(encoded);
                }
                continue;
            }
        };

        tracing::debug!(id = %request.id, method = %request.method, "IPC request");
        let pipeline = Arc::clone(&pipeline);
        let tx = tx.clone();
        in_flight.spawn(async move {
            let response = dispatch(&pipeline, request, &tx).await;
            if let Some(encoded) = encode(&response) {
                let _ = tx.send(encoded);
            }
        });
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "IPC request task panicked");
        }
    }
    drop(tx);

    writer
        .await
        .map_err(std::io::Error::other)?
}
