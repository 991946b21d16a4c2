//! Validation of the assembled configuration, chiefly the HELO identity.
//!
//! A loopback identity announced to a real mail exchanger is an immediate
//! reputation signal, so production startup refuses it outright.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

/// True for identities that must never reach a remote server in
/// production: empty, `localhost`, or anything in 127.0.0.0/8.
pub(crate) fn is_loopback_identity(identity: &str) -> bool {
    identity.is_empty() || identity == "localhost" || identity.starts_with("127.")
}

/// Checks the configuration for structural problems.
///
/// In production an unset or loopback `WORKER_HOSTNAME` is fatal, as is a
/// missing SOCKS5 proxy. Dev mode downgrades the identity problem to a
/// warning and fills in `localhost`.
pub(crate) fn validate(config: &mut Config) -> Result<()> {
    if is_loopback_identity(&config.worker_hostname) {
        if !config.is_dev {
            return Err(AppError::Config(format!(
                "WORKER_HOSTNAME must be a non-loopback FQDN in production (got {:?})",
                config.worker_hostname
            )));
        }
        if config.worker_hostname.is_empty() {
            config.worker_hostname = "localhost".to_string();
        }
        tracing::warn!(
            identity = %config.worker_hostname,
            "Using a loopback HELO identity (dev mode only)"
        );
    }

    match &config.proxy {
        Some(proxy) if proxy.address.trim().is_empty() => {
            return Err(AppError::Config(
                "SOCKS5_PROXY must be a host:port pair".to_string(),
            ));
        }
        None if !config.is_dev => {
            return Err(AppError::Config(
                "SOCKS5_PROXY is required in production mode - direct port-25 egress is never allowed"
                    .to_string(),
            ));
        }
        _ => {}
    }

    Ok(())
}
