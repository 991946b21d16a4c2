//! Catch-all detection via a random-recipient probe.
//!
//! Before the real recipient is checked, a sibling session asks the same
//! exchanger about a local part that cannot plausibly exist. A server
//! accepting it accepts anything, and the real check would carry no
//! signal.

use rand::{CryptoRng, Rng};
use tokio_util::sync::CancellationToken;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::net;
use crate::throttle::RateGovernor;
use crate::verification::smtp::SmtpSession;

const LOCAL_PART_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A random alphanumeric local part of the given length. Production
/// callers supply an OS-backed RNG; tests pass a seeded one.
pub fn random_local_part<R: Rng + CryptoRng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..LOCAL_PART_CHARSET.len());
            LOCAL_PART_CHARSET[idx] as char
        })
        .collect()
}

/// Probes `(host, port)` with a random recipient under `domain` and
/// reports whether the domain accepts arbitrary local parts.
///
/// The probe pays the same pacing cost as a real dialog: one global token
/// and one token from the domain's bucket, acquired before the dial. Any
/// dial or dialog failure is absorbed as "not catch-all"; the main check
/// proceeds and carries the cost of a second attempt.
///
/// # Errors
///
/// Only cancellation of the ambient context surfaces as an error.
pub async fn is_catch_all<R: Rng + CryptoRng>(
    config: &Config,
    governor: &RateGovernor,
    host: &str,
    port: u16,
    domain: &str,
    rng: &mut R,
    cancel: &CancellationToken,
) -> Result<bool> {
    let probe_email = format!(
        "{}@{}",
        random_local_part(rng, config.probe_local_len),
        domain
    );

    governor.acquire_global(cancel).await?;
    governor.acquire_domain(domain, cancel).await?;

    let conn = match net::dial(host, port, config).await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::debug!(domain, error = %err, "Catch-all probe could not connect, assuming discriminating");
            return Ok(false);
        }
    };

    let mut session = SmtpSession::new(conn);
    let dialog = session.run_envelope(&config.worker_hostname, &config.mail_from, &probe_email);

    let reply = match tokio::time::timeout(config.dialog_timeout, dialog).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(err)) => {
            tracing::debug!(domain, error = %err, "Catch-all probe dialog failed, assuming discriminating");
            return Ok(false);
        }
        Err(_) => {
            tracing::debug!(domain, "Catch-all probe timed out, assuming discriminating");
            return Ok(false);
        }
    };

    session.quit().await;

    let accepted = matches!(reply.code, 250 | 251 | 252);
    if accepted {
        tracing::info!(domain, code = reply.code, "Catch-all domain detected via probe");
    }
    Ok(accepted)
}
