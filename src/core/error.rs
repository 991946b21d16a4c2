//! Defines the custom error types for the email-sentinel worker.

use std::io;
use thiserror::Error;

/// The primary error type for the validation worker.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error initializing necessary components (e.g., clients, resolvers).
    #[error("Initialization Error: {0}")]
    Initialization(String),

    /// Error related to input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error talking to the queue broker.
    #[error("Broker Error: {0}")]
    Broker(#[from] redis::RedisError),

    /// Error executing a statement against the outcome store.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Error during DNS resolution.
    #[error("DNS Resolution Error: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    /// Error establishing the SOCKS5 egress tunnel.
    #[error("Proxy Error: {0}")]
    Proxy(#[from] tokio_socks::Error),

    /// The ambient context was cancelled while waiting.
    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AppError>;
