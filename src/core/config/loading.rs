//! Environment ingestion for the worker configuration.
//!
//! Every recognised option comes from the process environment; there is no
//! configuration file. `.env` support is handled by the binary before this
//! runs.

use std::env;

use crate::core::config::{validation, Config};
use crate::core::error::Result;
use crate::core::types::ProxyConfig;

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Assembles the runtime configuration from the process environment,
    /// applying defaults for anything unset and validating the result.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the HELO identity is missing or
    /// loopback in production mode.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        config.is_dev = env_opt("IS_DEV").is_some_and(|v| v == "true");

        if let Some(address) = env_opt("SOCKS5_PROXY") {
            config.proxy = Some(ProxyConfig {
                address,
                username: env_opt("PROXY_USER"),
                password: env_opt("PROXY_PASS"),
            });
        }

        if let Some(hostname) = env_opt("WORKER_HOSTNAME") {
            config.worker_hostname = hostname;
        }

        if let Some(addr) = env_opt("REDIS_ADDR") {
            config.redis_addr = addr;
        }
        config.redis_password = env_opt("REDIS_PASSWORD");
        if let Some(db) = env_opt("REDIS_DB") {
            config.redis_db = db.trim().parse().unwrap_or(0);
        }

        if let Some(url) = env_opt("DATABASE_URL") {
            config.database_url = url;
        }

        validation::validate(&mut config)?;

        Ok(config)
    }
}
