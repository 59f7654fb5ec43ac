//! Server-sent event stream of a job's log.
//!
//! Each log line is sent as a `data:` event. The stream ends with one
//! `event: done` whose data is a JSON summary of the outcome.

use std::convert::Infallible;
use std::path::Path;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{routing::get, Router};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use codereel_core::error::CoreError;
use codereel_core::job::{JobFailure, JobOutcome};
use codereel_core::types::RunId;
use codereel_pipeline::logs::{log_stream, LogEvent};

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub run_id: String,
}

/// Payload of the terminal `done` event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload<'a> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_path: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a JobFailure>,
}

impl<'a> From<&'a JobOutcome> for DonePayload<'a> {
    fn from(outcome: &'a JobOutcome) -> Self {
        match outcome {
            JobOutcome::Succeeded {
                video_path,
                video_url,
            } => Self {
                success: true,
                video_path: Some(video_path.as_path()),
                video_url: Some(video_url.as_str()),
                error: None,
            },
            JobOutcome::Failed(failure) => Self {
                success: false,
                video_path: None,
                video_url: None,
                error: Some(failure),
            },
        }
    }
}

/// GET /api/logs?runId= -- stream log lines until the job is done.
async fn stream_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let run_id = RunId::from(query.run_id);
    if state.store.snapshot(&run_id).await.is_none() {
        return Err(CoreError::JobNotFound(run_id.to_string()).into());
    }

    tracing::debug!(run_id = %run_id, "Log stream opened");
    let events = log_stream(
        state.store.clone(),
        run_id,
        state.config.log_poll_interval,
    )
    .map(|event| Ok(to_sse_event(event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub fn to_sse_event(event: LogEvent) -> Event {
    match event {
        LogEvent::Line(line) => Event::default().data(line.replace('\r', "")),
        LogEvent::Done(outcome) => {
            let payload = serde_json::to_string(&DonePayload::from(&outcome))
                .unwrap_or_else(|_| "{}".to_string());
            Event::default().event("done").data(payload)
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/logs", get(stream_logs))
}
