//! Promotion of due retry items back onto the work queue.
//!
//! Greylisted items sit in the retry set until their score passes; a
//! single monitor task sweeps the set on a fixed ticker and moves due
//! members to the head of the main queue. Removal happens before the
//! push so two monitors never double-promote; a failed push re-schedules
//! the item rather than losing it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::broker::TaskQueue;
use crate::core::clock::Clock;
use crate::core::types::WorkItem;

pub struct RetryMonitor {
    queue: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    period: Duration,
    retry_delay_secs: u64,
}

impl RetryMonitor {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        period: Duration,
        retry_delay_secs: u64,
    ) -> Self {
        Self {
            queue,
            clock,
            period,
            retry_delay_secs,
        }
    }

    /// Runs the ticker until the ambient context is cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Retry monitor shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// One pass over the retry set: promote everything due, delete
    /// malformed members, re-schedule anything that fails to land on the
    /// queue. Public so tests can drive ticks deterministically.
    pub async fn sweep(&self) {
        let now = self.clock.now_epoch();

        let due = match self.queue.due_retries(now).await {
            Ok(due) => due,
            Err(err) => {
                tracing::warn!(error = %err, "Error reading retry queue");
                return;
            }
        };

        if due.is_empty() {
            return;
        }
        tracing::info!(count = due.len(), "Found email(s) ready for retry");

        for payload in due {
            let item = match WorkItem::from_payload(&payload) {
                Ok(item) => item,
                Err(err) => {
                    tracing::warn!(error = %err, "Dropping malformed retry entry");
                    let _ = self.queue.remove_retry(&payload).await;
                    continue;
                }
            };

            // Claim the member first; losing the race means another
            // instance already promoted it.
            match self.queue.remove_retry(&payload).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to remove item from retry queue");
                    continue;
                }
            }

            if let Err(err) = self.queue.push_front(&payload).await {
                tracing::warn!(error = %err, email = %item.email, "Failed to push retry job to queue, re-scheduling");
                let due_at = now + self.retry_delay_secs;
                if let Err(err) = self.queue.schedule_retry(&payload, due_at).await {
                    tracing::error!(error = %err, email = %item.email, "Retry entry lost: re-schedule failed");
                }
                continue;
            }

            tracing::info!(email = %item.email, job_id = %item.job_id, "Retrying email");
        }
    }
}
