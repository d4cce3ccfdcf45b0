//! Error types for the verification service.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the verification service.
///
/// Each variant corresponds to one HTTP status; the mapping lives in
/// [`Error::status_code`] so the HTTP layer never pattern-matches variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Request carried neither a valid API key nor the internal trust key.
    #[error("Unauthorized: Invalid or missing API key")]
    Unauthorized,

    /// Malformed request (missing field, bad wallet format, bad webhook URL).
    #[error("{0}")]
    BadRequest(String),

    /// Subscription allowance exhausted for the external user.
    #[error("Subscription limit reached: {0}")]
    QuotaExceeded(String),

    /// Per-wallet rate limit refused the request.
    #[error("Rate limit exceeded. Try again after {reset_at}")]
    RateLimited {
        /// Configured window maximum.
        limit: u32,
        /// Requests counted in the current window.
        count: u32,
        /// When the current window resets.
        reset_at: DateTime<Utc>,
    },

    /// The ledger API returned a non-2xx status or a transport failure.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// A ledger page request exceeded its timeout.
    #[error("Ledger request timed out")]
    LedgerTimeout,

    /// The persistence store refused an operation.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Webhook delivery failed after all attempts. Never surfaced to callers.
    #[error("Webhook delivery failed: {0}")]
    Webhook(String),

    /// Configuration file or value error.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status this error maps to on the wire.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Unauthorized => 401,
            Error::BadRequest(_) => 400,
            Error::QuotaExceeded(_) => 403,
            Error::RateLimited { .. } => 429,
            Error::LedgerUnavailable(_) => 503,
            Error::LedgerTimeout => 504,
            Error::Persistence(_) | Error::Webhook(_) | Error::Config(_) | Error::Io(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Unauthorized.status_code(), 401);
        assert_eq!(Error::BadRequest("x".into()).status_code(), 400);
        assert_eq!(Error::QuotaExceeded("x".into()).status_code(), 403);
        assert_eq!(Error::LedgerUnavailable("x".into()).status_code(), 503);
        assert_eq!(Error::LedgerTimeout.status_code(), 504);
        assert_eq!(Error::Persistence("x".into()).status_code(), 500);
    }

    #[test]
    fn test_unauthorized_message_is_contractual() {
        assert_eq!(
            Error::Unauthorized.to_string(),
            "Unauthorized: Invalid or missing API key"
        );
    }

    #[test]
    fn test_rate_limited_message_prefix() {
        let err = Error::RateLimited {
            limit: 5,
            count: 5,
            reset_at: Utc::now(),
        };
        assert!(err.to_string().starts_with("Rate limit exceeded"));
    }
}
