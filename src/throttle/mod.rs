//! Two-layer token-bucket pacing for outbound SMTP traffic.
//!
//! The global bucket is the hard system ceiling, charged before any work
//! is dequeued and before every probe connection. Per-domain buckets
//! protect individual receivers; well-known providers get tighter rows
//! and everything else a lazily-created default.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::error::{AppError, Result};

/// Classic token bucket: up to `capacity` tokens, refilled continuously
/// at `refill_rate` per second.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate: f64, burst: u32) -> Self {
        let capacity = f64::from(burst);
        Self {
            tokens: capacity,
            capacity,
            refill_rate: rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
    }
}

/// One bucket behind a lock, with an async acquire that sleeps until a
/// token frees up or the ambient context is cancelled.
#[derive(Debug)]
pub struct Limiter {
    bucket: Mutex<TokenBucket>,
}

impl Limiter {
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(rate, burst)),
        }
    }

    /// Blocks until one token is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cancelled`] when `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                if bucket.try_consume() {
                    return Ok(());
                }
                bucket.time_until_available()
            };

            tokio::select! {
                () = cancel.cancelled() => return Err(AppError::Cancelled),
                () = tokio::time::sleep(wait.max(Duration::from_millis(1))) => {}
            }
        }
    }
}

/// Default rows for receivers known to police connection rates hard.
/// Everything else gets `DEFAULT_DOMAIN_LIMIT`.
const SEEDED_DOMAIN_LIMITS: &[(&str, f64, u32)] = &[
    ("gmail.com", 2.0, 2),
    ("googlemail.com", 2.0, 2),
    ("outlook.com", 1.0, 1),
    ("hotmail.com", 1.0, 1),
    ("live.com", 1.0, 1),
    ("yahoo.com", 1.0, 1),
];

const DEFAULT_DOMAIN_LIMIT: (f64, u32) = (5.0, 5);

/// The process-wide rate governor: one global limiter plus a map of
/// per-domain limiters keyed by lowercased domain.
#[derive(Debug)]
pub struct RateGovernor {
    global: Limiter,
    domains: RwLock<HashMap<String, Arc<Limiter>>>,
}

impl RateGovernor {
    pub fn new(global_rate: f64, global_burst: u32) -> Self {
        let mut domains = HashMap::new();
        for &(domain, rate, burst) in SEEDED_DOMAIN_LIMITS {
            domains.insert(domain.to_string(), Arc::new(Limiter::new(rate, burst)));
        }
        Self {
            global: Limiter::new(global_rate, global_burst),
            domains: RwLock::new(domains),
        }
    }

    /// Consumes one token from the global ceiling.
    pub async fn acquire_global(&self, cancel: &CancellationToken) -> Result<()> {
        self.global.acquire(cancel).await
    }

    /// Consumes one token from `domain`'s bucket, creating the default
    /// bucket on first contact.
    pub async fn acquire_domain(&self, domain: &str, cancel: &CancellationToken) -> Result<()> {
        let limiter = self.domain_limiter(&domain.to_ascii_lowercase());
        limiter.acquire(cancel).await
    }

    fn domain_limiter(&self, domain: &str) -> Arc<Limiter> {
        if let Some(limiter) = self.domains.read().get(domain) {
            return Arc::clone(limiter);
        }

        // Re-check under the write lock: another worker may have created
        // the bucket between the read and here.
        let mut domains = self.domains.write();
        Arc::clone(domains.entry(domain.to_string()).or_insert_with(|| {
            let (rate, burst) = DEFAULT_DOMAIN_LIMIT;
            Arc::new(Limiter::new(rate, burst))
        }))
    }

    /// Number of domain buckets currently held (seeded plus lazily
    /// created). Exposed for observability and tests.
    pub fn domain_bucket_count(&self) -> usize {
        self.domains.read().len()
    }
}
