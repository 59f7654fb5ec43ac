//! Periodic removal of finished jobs past their TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use codereel_core::job::JobStore;

/// Default sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Expire old jobs every `interval` until `cancel` is triggered.
pub async fn run(store: Arc<JobStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        ttl_secs = store.config().ttl.as_secs(),
        "Job sweeper started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = store.expire(Utc::now()).await;
                if removed > 0 {
                    let remaining = store.len().await;
                    tracing::info!(removed, remaining, "Expired finished jobs");
                } else {
                    tracing::debug!("Job sweeper: nothing to expire");
                }
            }
        }
    }
}
