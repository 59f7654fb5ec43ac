//! Render job records and the bounded in-memory job store.
//!
//! A job is created when a request arrives, collects log lines while it
//! runs, and makes exactly one `Pending -> Done` transition carrying its
//! [`JobOutcome`]. The store keeps insertion order so eviction can drop
//! the oldest finished job once the capacity is reached; pending jobs are
//! never evicted.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::{env_or, ConfigError};
use crate::types::{Engine, RunId, Timestamp};

/// Default maximum number of jobs held in memory.
pub const DEFAULT_JOB_CAPACITY: usize = 256;

/// Default time a finished job stays queryable.
pub const DEFAULT_JOB_TTL: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Job types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Done,
}

/// Why a job failed: a stable machine-readable `kind` plus the message
/// shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub kind: String,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded {
        /// Location of the finished video on disk.
        video_path: PathBuf,
        /// URL path under which the video is served.
        video_url: String,
    },
    Failed(JobFailure),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// One end-to-end request from prompt to finished video or failure.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub run_id: RunId,
    pub prompt: String,
    pub engine: Engine,
    /// Generated script, once code generation has succeeded.
    pub code: Option<String>,
    /// Append-only log.
    pub logs: Vec<String>,
    pub status: JobStatus,
    pub outcome: Option<JobOutcome>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Serializable view of a job for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub run_id: RunId,
    pub engine: Engine,
    pub status: JobStatus,
    pub log_count: usize,
    pub outcome: Option<JobOutcome>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Log lines after a cursor, read together with the job's outcome.
#[derive(Debug, Clone)]
pub struct LogSlice {
    pub lines: Vec<String>,
    /// Cursor to pass to the next [`JobStore::logs_since`] call.
    pub next_cursor: usize,
    /// Set once the job is done. When present, `lines` contains every
    /// remaining line; no more will ever be appended.
    pub outcome: Option<JobOutcome>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct JobStoreConfig {
    /// Maximum number of jobs (pending + done) held at once.
    pub capacity: usize,
    /// How long a done job is kept before [`JobStore::expire`] removes it.
    pub ttl: Duration,
}

impl JobStoreConfig {
    /// | Env Var        | Default |
    /// |----------------|---------|
    /// | `JOB_CAPACITY` | `256`   |
    /// | `JOB_TTL_SECS` | `3600`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            capacity: env_or("JOB_CAPACITY", DEFAULT_JOB_CAPACITY)?.max(1),
            ttl: Duration::from_secs(env_or("JOB_TTL_SECS", DEFAULT_JOB_TTL.as_secs())?),
        })
    }
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_JOB_CAPACITY,
            ttl: DEFAULT_JOB_TTL,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("Render job not found: {0}")]
    NotFound(RunId),

    #[error("Render job {0} has already completed")]
    AlreadyCompleted(RunId),

    #[error("Job store is full ({capacity} jobs still running)")]
    Full { capacity: usize },
}

/// Bounded, insertion-ordered job table.
///
/// Designed to be wrapped in `Arc` and shared by every request handler
/// and render task.
pub struct JobStore {
    config: JobStoreConfig,
    jobs: RwLock<IndexMap<RunId, RenderJob>>,
}

impl JobStore {
    pub fn new(config: JobStoreConfig) -> Self {
        Self {
            config,
            jobs: RwLock::new(IndexMap::new()),
        }
    }

    pub fn config(&self) -> &JobStoreConfig {
        &self.config
    }

    /// Create a pending job and return its id.
    ///
    /// At capacity, the oldest done job is evicted first. If every job is
    /// still pending the call fails with [`JobStoreError::Full`].
    pub async fn create(&self, prompt: String, engine: Engine) -> Result<RunId, JobStoreError> {
        let mut jobs = self.jobs.write().await;

        if jobs.len() >= self.config.capacity {
            let oldest_done = jobs
                .values()
                .position(|job| job.status == JobStatus::Done)
                .ok_or(JobStoreError::Full {
                    capacity: self.config.capacity,
                })?;
            if let Some((evicted, _)) = jobs.shift_remove_index(oldest_done) {
                tracing::debug!(run_id = %evicted, "Evicted finished job to make room");
            }
        }

        let run_id = RunId::generate();
        jobs.insert(
            run_id.clone(),
            RenderJob {
                run_id: run_id.clone(),
                prompt,
                engine,
                code: None,
                logs: Vec::new(),
                status: JobStatus::Pending,
                outcome: None,
                created_at: chrono::Utc::now(),
                completed_at: None,
            },
        );
        Ok(run_id)
    }

    /// Append one log line. Rejected once the job is done so a reader that
    /// has seen the outcome has also seen every line.
    pub async fn append_log(&self, run_id: &RunId, line: String) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(run_id)
            .ok_or_else(|| JobStoreError::NotFound(run_id.clone()))?;
        if job.status == JobStatus::Done {
            return Err(JobStoreError::AlreadyCompleted(run_id.clone()));
        }
        job.logs.push(line);
        Ok(())
    }

    /// Record the generated script for a job.
    pub async fn set_code(&self, run_id: &RunId, code: String) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(run_id)
            .ok_or_else(|| JobStoreError::NotFound(run_id.clone()))?;
        job.code = Some(code);
        Ok(())
    }

    /// Perform the single `Pending -> Done` transition.
    pub async fn complete(&self, run_id: &RunId, outcome: JobOutcome) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(run_id)
            .ok_or_else(|| JobStoreError::NotFound(run_id.clone()))?;
        if job.status == JobStatus::Done {
            return Err(JobStoreError::AlreadyCompleted(run_id.clone()));
        }
        job.status = JobStatus::Done;
        job.outcome = Some(outcome);
        job.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Read the log lines after `cursor`, plus the outcome if the job is
    /// done. Returns `None` for unknown (or expired) jobs.
    pub async fn logs_since(&self, run_id: &RunId, cursor: usize) -> Option<LogSlice> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(run_id)?;
        let start = cursor.min(job.logs.len());
        Some(LogSlice {
            lines: job.logs[start..].to_vec(),
            next_cursor: job.logs.len(),
            outcome: job.outcome.clone(),
        })
    }

    pub async fn get(&self, run_id: &RunId) -> Option<RenderJob> {
        self.jobs.read().await.get(run_id).cloned()
    }

    pub async fn snapshot(&self, run_id: &RunId) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().await;
        jobs.get(run_id).map(|job| JobSnapshot {
            run_id: job.run_id.clone(),
            engine: job.engine,
            status: job.status,
            log_count: job.logs.len(),
            outcome: job.outcome.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        })
    }

    /// Remove done jobs whose completion is at least `ttl` before `now`.
    /// Returns the number of jobs removed.
    pub async fn expire(&self, now: Timestamp) -> usize {
        let ttl = self.config.ttl;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| match job.completed_at {
            Some(done_at) => (now - done_at).to_std().map_or(true, |age| age < ttl),
            None => true,
        });
        before - jobs.len()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
