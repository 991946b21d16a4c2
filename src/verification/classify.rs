//! Maps SMTP reply codes to verdicts.

use crate::core::types::EmailStatus;

/// Total classification of an RCPT reply code.
///
/// Returns the status plus whether the reply is a temporary failure that
/// belongs in the delayed-retry lane.
pub const fn classify(code: u16) -> (EmailStatus, bool) {
    match code {
        250 => (EmailStatus::Valid, false),
        // Forwarded or accepted-without-verification replies.
        251 | 252 => (EmailStatus::CatchAll, false),
        // Greylisting and service-unavailable family.
        421 | 450 | 451 => (EmailStatus::Greylisted, true),
        // Hard bounces.
        550 | 551 | 553 => (EmailStatus::Invalid, false),
        _ => (EmailStatus::Unknown, false),
    }
}
