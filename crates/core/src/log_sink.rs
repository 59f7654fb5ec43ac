//! Where job log lines go.
//!
//! Renderers and the pipeline write progress through a [`LogSink`] so the
//! same code can feed the HTTP job store or push lines straight to an IPC
//! client.

use std::future::Future;
use std::sync::Arc;

use crate::job::JobStore;
use crate::types::RunId;

/// Destination for human-readable job log lines.
pub trait LogSink: Send + Sync {
    /// Append one line. Delivery failures are logged, never returned:
    /// a lost log line must not abort a render.
    fn log(&self, line: String) -> impl Future<Output = ()> + Send;
}

impl<S: LogSink> LogSink for &S {
    fn log(&self, line: String) -> impl Future<Output = ()> + Send {
        (**self).log(line)
    }
}

/// Discards every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    async fn log(&self, _line: String) {}
}

/// Appends lines to one job in a [`JobStore`].
#[derive(Clone)]
pub struct JobLog {
    store: Arc<JobStore>,
    run_id: RunId,
}

impl JobLog {
    pub fn new(store: Arc<JobStore>, run_id: RunId) -> Self {
        Self { store, run_id }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }
}

impl LogSink for JobLog {
    async fn log(&self, line: String) {
        tracing::info!(run_id = %self.run_id, "{line}");
        if let Err(e) = self.store.append_log(&self.run_id, line).await {
            tracing::warn!(run_id = %self.run_id, error = %e, "Dropped job log line");
        }
    }
}
