//! A job's log as a stream.
//!
//! The store is polled at a fixed interval. Each poll returns the lines
//! after the last cursor and, once the job is done, its outcome, read
//! under one lock. Since lines are never appended after completion, a
//! subscriber sees every line exactly once and in order, then a single
//! [`LogEvent::Done`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::time::{Interval, MissedTickBehavior};

use codereel_core::job::{JobOutcome, JobStore};
use codereel_core::types::RunId;

/// Default poll interval for log subscribers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Line(String),
    Done(JobOutcome),
}

struct Subscription {
    store: Arc<JobStore>,
    run_id: RunId,
    cursor: usize,
    buffered: VecDeque<LogEvent>,
    interval: Interval,
    finished: bool,
}

/// Stream every log line of `run_id` from the start, ending after the
/// outcome. Ends early (without `Done`) if the job disappears from the
/// store.
pub fn log_stream(
    store: Arc<JobStore>,
    run_id: RunId,
    poll_interval: Duration,
) -> impl Stream<Item = LogEvent> + Send + 'static {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let subscription = Subscription {
        store,
        run_id,
        cursor: 0,
        buffered: VecDeque::new(),
        interval,
        finished: false,
    };

    futures::stream::unfold(subscription, |mut sub| async move {
        loop {
            if let Some(event) = sub.buffered.pop_front() {
                return Some((event, sub));
            }
            if sub.finished {
                return None;
            }

            sub.interval.tick().await;
            let Some(slice) = sub.store.logs_since(&sub.run_id, sub.cursor).await else {
                tracing::debug!(run_id = %sub.run_id, "Job left the store while streaming");
                return None;
            };

            sub.cursor = slice.next_cursor;
            sub.buffered.extend(slice.lines.into_iter().map(LogEvent::Line));
            if let Some(outcome) = slice.outcome {
                sub.buffered.push_back(LogEvent::Done(outcome));
                sub.finished = true;
            }
        }
    })
}
