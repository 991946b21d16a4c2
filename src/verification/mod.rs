//! The per-address validation pipeline.
//!
//! Orchestrates resolution, catch-all probing and the envelope dialog,
//! folding every failure mode into a single [`Outcome`]. Only
//! cancellation of the ambient context escapes as an error; everything
//! else is a verdict.

pub mod classify;
pub mod mx;
pub mod probe;
pub mod smtp;
pub mod syntax;

use rand::{CryptoRng, Rng};
use tokio_util::sync::CancellationToken;

use crate::core::error::Result;
use crate::core::types::{EmailStatus, Outcome};
use crate::net;
use crate::services::Services;
use crate::verification::smtp::SmtpSession;

/// Validates one address against its mail exchanger and returns the
/// verdict.
///
/// Order of operations: domain split → exchanger selection (dev sink or
/// MX) → catch-all probe (production only) → dial → envelope dialog →
/// classification. The caller is responsible for syntax validation and
/// for the domain-bucket wait; the probe pays its own pacing cost.
///
/// # Errors
///
/// Returns an error only when `cancel` fires during a rate-limit wait.
pub async fn check_email<R: Rng + CryptoRng>(
    services: &Services,
    email: &str,
    rng: &mut R,
    cancel: &CancellationToken,
) -> Result<Outcome> {
    let config = &services.config;

    let Some((_, domain)) = email.split_once('@') else {
        return Ok(Outcome::terminal(
            EmailStatus::Invalid,
            550,
            "Invalid email format",
        ));
    };

    let (host, port) = if config.is_dev {
        config.dev_sink()
    } else {
        match services.resolver.preferred_exchanger(domain).await {
            Ok(host) => (host, 25),
            Err(err) => {
                tracing::debug!(domain, error = %err, "MX resolution failed");
                return Ok(Outcome::terminal(EmailStatus::Invalid, 550, err.to_string()));
            }
        }
    };

    // A catch-all domain accepts any recipient; asking about the real one
    // would tell us nothing, so the main dialog is skipped entirely.
    if !config.is_dev
        && probe::is_catch_all(
            config,
            &services.governor,
            &host,
            port,
            domain,
            rng,
            cancel,
        )
        .await?
    {
        return Ok(Outcome::terminal(
            EmailStatus::CatchAll,
            250,
            "Catch-all domain detected via probe",
        ));
    }

    let conn = match net::dial(&host, port, config).await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::debug!(domain, error = %err, "Connection failed");
            return Ok(Outcome::no_reply(
                EmailStatus::Unknown,
                format!("Connection failed: {err}"),
            ));
        }
    };

    let mut session = SmtpSession::new(conn);
    let dialog = session.run_envelope(&config.worker_hostname, &config.mail_from, email);

    let reply = match tokio::time::timeout(config.dialog_timeout, dialog).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(err)) => {
            return Ok(Outcome::terminal(
                EmailStatus::Unknown,
                err.smtp_code(),
                err.to_string(),
            ));
        }
        Err(_) => {
            return Ok(Outcome::no_reply(
                EmailStatus::Unknown,
                format!("SMTP dialog timed out after {:?}", config.dialog_timeout),
            ));
        }
    };

    session.quit().await;

    let (status, retryable) = classify::classify(reply.code);
    Ok(Outcome {
        status,
        smtp_code: reply.code,
        bounce_reason: reply.text,
        retryable,
    })
}
