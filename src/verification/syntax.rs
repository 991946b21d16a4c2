//! Stateless lexical validation of an address string.
//!
//! Strict enough to catch double `@`, missing TLDs, edge dots and
//! double dots before any network cost is paid; permissive enough to
//! accept the full RFC 5322 local-part character class.

use std::sync::LazyLock;

use regex::Regex;

/// Pragmatic RFC-5322 shape: the printable local-part character class,
/// then dot-separated LDH labels with no hyphen at a label edge.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email regex pattern failed to compile. This is a bug.")
});

/// Checks whether `email` is lexically plausible as a deliverable address.
///
/// Rejections here short-circuit the whole pipeline with an
/// `INVALID / 550 / "Invalid email syntax"` outcome.
pub fn is_valid_syntax(email: &str) -> bool {
    if email.len() < 3 || email.len() > 254 {
        return false;
    }

    if email.matches('@').count() != 1 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if local.contains("..") || local.starts_with('.') || local.ends_with('.') {
        return false;
    }

    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    if domain.contains("..") || domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }

    // TLD required, at least two characters.
    let Some((_, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if tld.len() < 2 {
        return false;
    }

    EMAIL_REGEX.is_match(email)
}

/// The domain half of a syntactically valid address, lowercased for use
/// as a rate-limit key.
pub fn domain_of(email: &str) -> Option<String> {
    email.split_once('@').map(|(_, d)| d.to_ascii_lowercase())
}
