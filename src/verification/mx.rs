//! DNS MX resolution for the target domain.
//!
//! Every failure mode here collapses to a hard INVALID verdict: a domain
//! whose mail exchanger cannot be determined cannot receive mail, and
//! probing an A record instead would poison the results.

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use crate::core::error::Result;

/// Why no usable exchanger could be produced for a domain. The message is
/// surfaced verbatim as the stored bounce reason.
#[derive(Debug, thiserror::Error)]
pub enum MxError {
    #[error("MX lookup failed: {0}")]
    Lookup(#[from] trust_dns_resolver::error::ResolveError),

    #[error("No MX records found")]
    NoRecords,

    #[error("Invalid MX record (empty hostname)")]
    EmptyHost,
}

/// Async MX resolver shared by all workers.
pub struct MxResolver {
    resolver: TokioAsyncResolver,
}

impl MxResolver {
    /// Builds a resolver from the system configuration, falling back to
    /// the library defaults when `/etc/resolv.conf` is unusable.
    pub fn new() -> Result<Self> {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(err) => {
                tracing::warn!(error = %err, "System DNS configuration unusable, using defaults");
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Ok(Self { resolver })
    }

    /// Returns the preferred (lowest-preference) mail exchanger hostname
    /// for `domain`, with the trailing root dot stripped.
    pub async fn preferred_exchanger(&self, domain: &str) -> std::result::Result<String, MxError> {
        let lookup = self.resolver.mx_lookup(domain).await?;

        let preferred = lookup
            .iter()
            .min_by_key(|mx| mx.preference())
            .ok_or(MxError::NoRecords)?;

        let host = preferred
            .exchange()
            .to_utf8()
            .trim()
            .trim_end_matches('.')
            .to_string();
        if host.is_empty() {
            return Err(MxError::EmptyHost);
        }

        tracing::debug!(domain, exchanger = %host, preference = preferred.preference(), "Resolved MX");
        Ok(host)
    }
}
