//! The dependency aggregate shared by the dispatcher, the retry monitor
//! and every worker.
//!
//! Constructed once at bootstrap and passed around behind an `Arc`; no
//! component reaches for globals.

use std::sync::Arc;

use crate::broker::TaskQueue;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::store::OutcomeStore;
use crate::throttle::RateGovernor;
use crate::verification::mx::MxResolver;

pub struct Services {
    pub config: Config,
    pub governor: RateGovernor,
    pub queue: Arc<dyn TaskQueue>,
    pub store: Arc<dyn OutcomeStore>,
    pub resolver: MxResolver,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Wires up the aggregate from a validated configuration and the
    /// broker/store handles, with the wall clock.
    pub fn new(
        config: Config,
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn OutcomeStore>,
    ) -> Result<Self> {
        Self::with_clock(config, queue, store, Arc::new(SystemClock))
    }

    /// As [`Services::new`] but with an injected time source.
    pub fn with_clock(
        config: Config,
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn OutcomeStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let governor = RateGovernor::new(config.global_rate, config.global_burst);
        let resolver = MxResolver::new()?;
        Ok(Self {
            config,
            governor,
            queue,
            store,
            resolver,
            clock,
        })
    }
}
