#![forbid(unsafe_code)]

use super::{ConsumerGroup, ConsumerGroupHandler};
use crate::retry::{RetryBackoff, RetrySettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Sleeps for a duration but aborts early if the shutdown token fires.
/// Returns `true` if shutdown occurred during the wait.
pub async fn sleep_with_shutdown(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

/// Keeps `group` consuming `topics` until `shutdown` fires, rejoining after
/// every session end and backing off after failed sessions.
pub async fn run_consumer_group<G>(
    group: &G,
    topics: &[String],
    handler: Arc<dyn ConsumerGroupHandler>,
    settings: RetrySettings,
    shutdown: CancellationToken,
) where
    G: ConsumerGroup + ?Sized,
{
    let mut backoff = RetryBackoff::new(settings);
    let mut disconnected = false;

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        match group
            .consume(topics, Arc::clone(&handler), shutdown.clone())
            .await
        {
            Ok(()) => {
                if disconnected {
                    tracing::info!(
                        target: "orchestrate::daemon",
                        event = "consumer_group_reconnected",
                        topics = ?topics,
                    );
                    disconnected = false;
                }
                backoff.on_success();
            }
            Err(err) => {
                let delay = backoff.on_failure();
                tracing::error!(
                    target: "orchestrate::daemon",
                    event = "consumer_group_failed",
                    topics = ?topics,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                );
                disconnected = true;
                if sleep_with_shutdown(delay, &shutdown).await {
                    break;
                }
            }
        }
    }

    tracing::info!(
        target: "orchestrate::daemon",
        event = "consumer_group_stopped",
        topics = ?topics,
    );
}
