//! In-memory doubles for the broker, the store and the clock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use email_sentinel::broker::TaskQueue;
use email_sentinel::core::clock::Clock;
use email_sentinel::core::error::{AppError, Result};
use email_sentinel::core::types::EmailStatus;
use email_sentinel::store::OutcomeStore;

/// Work list + retry set, mirroring the Redis semantics the worker
/// relies on: LPUSH/BRPOP on the list, score-updating ZADD on the set.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    fail_next_push: AtomicBool,
}

#[derive(Default)]
struct QueueState {
    list: VecDeque<String>,
    retries: HashMap<String, u64>,
}

impl MemoryQueue {
    /// Enqueue fresh work the way the producer would (head push).
    pub fn seed(&self, payload: &str) {
        self.state.lock().list.push_front(payload.to_string());
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().list.len()
    }

    /// The payload at the head of the list (most recently pushed).
    pub fn head(&self) -> Option<String> {
        self.state.lock().list.front().cloned()
    }

    pub fn retry_score(&self, payload: &str) -> Option<u64> {
        self.state.lock().retries.get(payload).copied()
    }

    pub fn retry_len(&self) -> usize {
        self.state.lock().retries.len()
    }

    /// Makes the next `push_front` fail, to exercise the re-schedule
    /// path in the retry monitor.
    pub fn fail_next_push(&self) {
        self.fail_next_push.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn pop_task(&self, timeout: Duration) -> Result<Option<String>> {
        if let Some(payload) = self.state.lock().list.pop_back() {
            return Ok(Some(payload));
        }
        // Simulate the blocking-pop receive timeout without stalling tests.
        tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
        Ok(self.state.lock().list.pop_back())
    }

    async fn push_front(&self, payload: &str) -> Result<()> {
        if self.fail_next_push.swap(false, Ordering::SeqCst) {
            return Err(AppError::Initialization(
                "injected push failure".to_string(),
            ));
        }
        self.state.lock().list.push_front(payload.to_string());
        Ok(())
    }

    async fn schedule_retry(&self, payload: &str, due_at: u64) -> Result<()> {
        self.state
            .lock()
            .retries
            .insert(payload.to_string(), due_at);
        Ok(())
    }

    async fn due_retries(&self, now: u64) -> Result<Vec<String>> {
        let state = self.state.lock();
        let mut due: Vec<(String, u64)> = state
            .retries
            .iter()
            .filter(|(_, &score)| score <= now)
            .map(|(payload, &score)| (payload.clone(), score))
            .collect();
        due.sort_by_key(|(_, score)| *score);
        Ok(due.into_iter().map(|(payload, _)| payload).collect())
    }

    async fn remove_retry(&self, payload: &str) -> Result<bool> {
        Ok(self.state.lock().retries.remove(payload).is_some())
    }
}

/// Terminal rows keyed by `(jobId, email)`, with a write counter so
/// idempotence is observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub status: String,
    pub smtp_code: u16,
    pub bounce_reason: String,
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<(String, String), (StoredRow, usize)>>,
}

impl MemoryStore {
    pub fn row(&self, job_id: &str, email: &str) -> Option<StoredRow> {
        self.rows
            .lock()
            .get(&(job_id.to_string(), email.to_string()))
            .map(|(row, _)| row.clone())
    }

    pub fn write_count(&self, job_id: &str, email: &str) -> usize {
        self.rows
            .lock()
            .get(&(job_id.to_string(), email.to_string()))
            .map_or(0, |(_, count)| *count)
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}

#[async_trait]
impl OutcomeStore for MemoryStore {
    async fn record_outcome(
        &self,
        job_id: &str,
        email: &str,
        status: EmailStatus,
        smtp_code: u16,
        bounce_reason: &str,
    ) -> Result<()> {
        let mut rows = self.rows.lock();
        let entry = rows
            .entry((job_id.to_string(), email.to_string()))
            .or_insert_with(|| {
                (
                    StoredRow {
                        status: String::new(),
                        smtp_code: 0,
                        bounce_reason: String::new(),
                    },
                    0,
                )
            });
        entry.0 = StoredRow {
            status: status.as_str().to_string(),
            smtp_code,
            bounce_reason: bounce_reason.to_string(),
        };
        entry.1 += 1;
        Ok(())
    }
}

/// Settable clock for deterministic retry scoring.
pub struct MockClock {
    now: AtomicU64,
}

impl MockClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_epoch(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
