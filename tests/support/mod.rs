//! Shared fixtures for the integration tests: a configurable mock SMTP
//! server and in-memory queue/store/clock doubles.
#![allow(dead_code)] // Test utility module - not all helpers used in every test binary

pub mod memory;
pub mod mock_server;

use std::sync::Arc;

use email_sentinel::core::clock::Clock;
use email_sentinel::{Config, Services};

use self::memory::{MemoryQueue, MemoryStore};

/// Dev-mode configuration pointing the delivery sink at `port` on
/// loopback, with timeouts tightened for tests.
pub fn dev_config(port: u16) -> Config {
    Config {
        is_dev: true,
        worker_hostname: "localhost".to_string(),
        dev_sink_host: "127.0.0.1".to_string(),
        dev_sink_port: port,
        dialog_timeout: std::time::Duration::from_secs(2),
        connect_timeout: std::time::Duration::from_secs(2),
        global_rate: 100.0,
        global_burst: 100,
        ..Config::default()
    }
}

/// Services wired to in-memory doubles and the given clock.
pub fn test_services(
    config: Config,
    queue: Arc<MemoryQueue>,
    store: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
) -> Services {
    Services::with_clock(config, queue, store, clock).expect("failed to build test services")
}
