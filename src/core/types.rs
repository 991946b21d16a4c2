//! Core domain types shared across the worker: queue payloads, status
//! classification and per-address outcomes.

use serde::{Deserialize, Serialize};

/// A single address-validation task pulled from the work queue.
///
/// The pair is immutable for its lifetime; the retry scheduler may
/// re-enqueue the same item any number of times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub email: String,
}

impl WorkItem {
    /// Serializes the item into the queue wire form.
    pub fn to_payload(&self) -> crate::core::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses the queue wire form back into an item.
    pub fn from_payload(payload: &str) -> crate::core::error::Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Terminal classification of a validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailStatus {
    Valid,
    Invalid,
    Greylisted,
    CatchAll,
    Unknown,
}

impl EmailStatus {
    /// The literal persisted at the database boundary. Internal code only
    /// ever handles the enum; strings exist here and nowhere else.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Greylisted => "GREYLISTED",
            Self::CatchAll => "CATCH_ALL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the outcome of one SMTP validation attempt for an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: EmailStatus,
    /// The three-digit SMTP reply code; 0 means no reply was obtained.
    pub smtp_code: u16,
    /// Server text after the reply code, passed through verbatim.
    pub bounce_reason: String,
    /// True for temporary failures (421/450/451) that belong in the
    /// delayed-retry lane. Never persisted.
    pub retryable: bool,
}

impl Outcome {
    /// A terminal outcome carrying a reply code.
    pub fn terminal(status: EmailStatus, smtp_code: u16, bounce_reason: impl Into<String>) -> Self {
        Self {
            status,
            smtp_code,
            bounce_reason: bounce_reason.into(),
            retryable: false,
        }
    }

    /// The address never produced a reply (resolver, dial or I/O failure).
    pub fn no_reply(status: EmailStatus, bounce_reason: impl Into<String>) -> Self {
        Self::terminal(status, 0, bounce_reason)
    }

    /// A greylisting reply that should be retried after a delay.
    pub fn greylisted(smtp_code: u16, bounce_reason: impl Into<String>) -> Self {
        Self {
            status: EmailStatus::Greylisted,
            smtp_code,
            bounce_reason: bounce_reason.into(),
            retryable: true,
        }
    }
}

/// SOCKS5 egress tunnel settings. Mandatory in production mode.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// `host:port` of the proxy.
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Username/password auth applies only when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}
