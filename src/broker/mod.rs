//! Queue broker access: the main work list and the delayed-retry set.
//!
//! The worker only ever consumes from the tail of `email_queue` and
//! pushes retries back onto its head; the retry lane is a sorted set
//! scored by the Unix second at which an item becomes eligible.

pub mod retry;

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::core::error::Result;

/// Name of the main FIFO work list.
pub const WORK_QUEUE: &str = "email_queue";
/// Name of the delayed-retry sorted set.
pub const RETRY_QUEUE: &str = "email_retry_queue";

/// Broker operations the worker depends on. The Redis implementation is
/// the production path; tests substitute an in-memory double.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Blocking pop from the tail of the work queue; `None` on receive
    /// timeout.
    async fn pop_task(&self, timeout: Duration) -> Result<Option<String>>;

    /// Push a payload onto the head of the work queue, ahead of fresh
    /// work.
    async fn push_front(&self, payload: &str) -> Result<()>;

    /// Insert a payload into the retry set, due at `due_at` (Unix
    /// seconds). Re-inserting an existing member updates its score.
    async fn schedule_retry(&self, payload: &str, due_at: u64) -> Result<()>;

    /// All retry members with score at or below `now`.
    async fn due_retries(&self, now: u64) -> Result<Vec<String>>;

    /// Remove one member from the retry set. `false` when it was already
    /// gone (another instance won the race).
    async fn remove_retry(&self, payload: &str) -> Result<bool>;
}

/// Redis-backed queue pair.
#[derive(Clone)]
pub struct RedisQueue {
    manager: ConnectionManager,
}

impl RedisQueue {
    /// Connects to the broker and verifies it answers a PING.
    pub async fn connect(addr: &str, password: Option<&str>, db: i64) -> Result<Self> {
        let info = redis::ConnectionInfo {
            addr: parse_addr(addr),
            redis: redis::RedisConnectionInfo {
                db,
                password: password.map(str::to_string),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)?;
        let mut manager = ConnectionManager::new(client).await?;

        redis::cmd("PING").query_async::<_, ()>(&mut manager).await?;

        Ok(Self { manager })
    }
}

fn parse_addr(addr: &str) -> redis::ConnectionAddr {
    let (host, port) = match addr.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(6379)),
        None => (addr.to_string(), 6379),
    };
    redis::ConnectionAddr::Tcp(host, port)
}

#[async_trait]
impl TaskQueue for RedisQueue {
    async fn pop_task(&self, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        // Fractional seconds: truncating to whole seconds would turn a
        // sub-second timeout into BRPOP 0, which blocks forever.
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(WORK_QUEUE)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        Ok(popped.map(|(_, payload)| payload))
    }

    async fn push_front(&self, payload: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.lpush::<_, _, ()>(WORK_QUEUE, payload).await?;
        Ok(())
    }

    async fn schedule_retry(&self, payload: &str, due_at: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.zadd::<_, _, _, ()>(RETRY_QUEUE, payload, due_at).await?;
        Ok(())
    }

    async fn due_retries(&self, now: u64) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let members: Vec<String> = conn.zrangebyscore(RETRY_QUEUE, "-inf", now).await?;
        Ok(members)
    }

    async fn remove_retry(&self, payload: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.zrem(RETRY_QUEUE, payload).await?;
        Ok(removed > 0)
    }
}
