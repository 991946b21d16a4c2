//! email-sentinel: an SMTP deliverability validation worker.
//!
//! Consumes `{jobId, email}` tasks from a Redis queue, validates each
//! address by driving the SMTP envelope dialog (never `DATA`) against the
//! domain's mail exchanger, and persists a terminal verdict per address:
//!
//! - syntax and MX checks short-circuit hopeless addresses,
//! - a random-recipient probe flags catch-all domains,
//! - reply codes classify into `VALID | INVALID | GREYLISTED | CATCH_ALL
//!   | UNKNOWN`,
//! - greylisting (421/450/451) diverts into a delayed-retry lane instead
//!   of the store,
//! - a two-layer token bucket paces all outbound traffic, and in
//!   production every port-25 connection leaves through an authenticated
//!   SOCKS5 tunnel with no direct fallback.

pub mod broker;
pub mod core;
pub mod net;
pub mod services;
pub mod store;
pub mod throttle;
pub mod verification;
pub mod worker;

pub use crate::core::config::Config;
pub use crate::core::error::{AppError, Result};
pub use crate::core::types::{EmailStatus, Outcome, ProxyConfig, WorkItem};
pub use crate::services::Services;
