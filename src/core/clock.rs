//! Injectable time source for retry scheduling.
//!
//! Scores in the delayed-retry set are Unix epoch seconds; routing them
//! through a trait keeps due-time behavior deterministic under test.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Current Unix time in whole seconds.
    fn now_epoch(&self) -> u64;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
