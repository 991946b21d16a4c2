//! The dispatcher loop and the fixed worker pool.
//!
//! The dispatcher is the only consumer of the main queue. It charges the
//! global token bucket before every blocking pop, so the pop rate is the
//! system's hard outbound ceiling, then fans items out to the workers
//! over a bounded channel. Workers run the validation pipeline and land
//! each item in the retry lane or the store.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::error::AppError;
use crate::core::types::{EmailStatus, Outcome, WorkItem};
use crate::services::Services;
use crate::verification;
use crate::verification::syntax;

/// Pulls work off the queue under the global rate ceiling and feeds the
/// pool. Returns when the ambient context is cancelled.
pub async fn run_dispatcher(
    services: Arc<Services>,
    tx: mpsc::Sender<WorkItem>,
    cancel: CancellationToken,
) {
    tracing::info!("Dispatcher listening on the work queue");

    loop {
        // The ceiling applies to dequeues, not completions: one token,
        // one item handed to the pool.
        if services.governor.acquire_global(&cancel).await.is_err() {
            tracing::debug!("Dispatcher shutting down");
            return;
        }

        let payload = match services.queue.pop_task(services.config.pop_timeout).await {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(error = %err, "Error reading from work queue");
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(Duration::from_secs(1)) => continue,
                }
            }
        };

        let item = match WorkItem::from_payload(&payload) {
            Ok(item) => item,
            Err(err) => {
                tracing::warn!(error = %err, payload = %payload, "Failed to parse job JSON");
                continue;
            }
        };

        match tx.try_send(item) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(item)) => {
                tracing::warn!(email = %item.email, "Worker pool full, dropping job");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Worker channel closed, dispatcher exiting");
                return;
            }
        }
    }
}

/// Spawns the fixed pool; each worker shares the receiving end of the
/// dispatch channel.
pub fn spawn_workers(
    services: &Arc<Services>,
    rx: mpsc::Receiver<WorkItem>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    (1..=services.config.worker_count)
        .map(|id| {
            let services = Arc::clone(services);
            let rx = Arc::clone(&rx);
            let cancel = cancel.clone();
            tokio::spawn(worker_loop(id, services, rx, cancel))
        })
        .collect()
}

async fn worker_loop(
    id: usize,
    services: Arc<Services>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkItem>>>,
    cancel: CancellationToken,
) {
    let mut rng = OsRng;
    loop {
        let item = tokio::select! {
            () = cancel.cancelled() => return,
            item = async { rx.lock().await.recv().await } => match item {
                Some(item) => item,
                None => return,
            },
        };
        process_item(id, &services, &item, &mut rng, &cancel).await;
    }
}

/// Runs one work item through the pipeline and lands the result.
///
/// Pipeline order per item: syntax check → domain-bucket wait →
/// validation (`verification::check_email`) → retry lane or store write.
/// Cancellation mid-wait leaves the row at PENDING; the item will be
/// redelivered by the upstream at-least-once machinery.
pub async fn process_item<R: Rng + CryptoRng>(
    worker_id: usize,
    services: &Services,
    item: &WorkItem,
    rng: &mut R,
    cancel: &CancellationToken,
) {
    tracing::info!(worker = worker_id, email = %item.email, "Checking address");

    if !syntax::is_valid_syntax(&item.email) {
        tracing::info!(worker = worker_id, email = %item.email, "Invalid email syntax");
        let outcome = Outcome::terminal(EmailStatus::Invalid, 550, "Invalid email syntax");
        write_outcome(worker_id, services, item, &outcome).await;
        return;
    }

    let Some(domain) = syntax::domain_of(&item.email) else {
        let outcome = Outcome::terminal(EmailStatus::Invalid, 550, "Invalid email format");
        write_outcome(worker_id, services, item, &outcome).await;
        return;
    };

    // The global token was charged at dispatch; this is the per-receiver
    // wait.
    if let Err(err) = services.governor.acquire_domain(&domain, cancel).await {
        tracing::debug!(worker = worker_id, email = %item.email, error = %err, "Rate limit wait cancelled");
        return;
    }

    let outcome = match verification::check_email(services, &item.email, rng, cancel).await {
        Ok(outcome) => outcome,
        Err(AppError::Cancelled) => {
            tracing::debug!(worker = worker_id, email = %item.email, "Validation cancelled");
            return;
        }
        Err(err) => {
            tracing::warn!(worker = worker_id, email = %item.email, error = %err, "SMTP check error");
            Outcome::no_reply(EmailStatus::Unknown, err.to_string())
        }
    };

    if outcome.retryable {
        divert_to_retry_lane(worker_id, services, item, &outcome).await;
        return;
    }

    tracing::info!(
        worker = worker_id,
        email = %item.email,
        status = %outcome.status,
        code = outcome.smtp_code,
        "Validation complete"
    );
    write_outcome(worker_id, services, item, &outcome).await;
}

/// Greylisted items skip the store and wait out their delay in the retry
/// set. If the lane cannot be reached the greylisted verdict is persisted
/// instead, so the item is never silently lost.
async fn divert_to_retry_lane(
    worker_id: usize,
    services: &Services,
    item: &WorkItem,
    outcome: &Outcome,
) {
    let due_at = services.clock.now_epoch() + services.config.retry_delay_secs;
    tracing::info!(
        worker = worker_id,
        email = %item.email,
        code = outcome.smtp_code,
        due_at,
        "Greylisted, adding to retry queue"
    );

    let payload = match item.to_payload() {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!(worker = worker_id, email = %item.email, error = %err, "Failed to serialize job for retry queue");
            write_outcome(worker_id, services, item, outcome).await;
            return;
        }
    };

    if let Err(err) = services.queue.schedule_retry(&payload, due_at).await {
        tracing::error!(worker = worker_id, email = %item.email, error = %err, "Failed to add to retry queue");
        write_outcome(worker_id, services, item, outcome).await;
    }
}

async fn write_outcome(worker_id: usize, services: &Services, item: &WorkItem, outcome: &Outcome) {
    if let Err(err) = services
        .store
        .record_outcome(
            &item.job_id,
            &item.email,
            outcome.status,
            outcome.smtp_code,
            &outcome.bounce_reason,
        )
        .await
    {
        // Not retried here: the row stays PENDING and an operator replay
        // picks it up.
        tracing::error!(worker = worker_id, email = %item.email, error = %err, "Database update error");
    }
}
