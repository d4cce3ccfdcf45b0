//! Request authentication.
//!
//! Callers present either the server API key in `x-api-key` or, for
//! internal calls, the platform anonymous key in `apikey`. Key comparison
//! is constant-time over equal-length inputs.

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use axum::http::HeaderMap;

/// Compare two byte slices without short-circuiting on the first mismatch.
///
/// A length mismatch returns early; lengths are not secret here.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Authorize a request from its headers.
///
/// # Errors
///
/// Returns [`Error::Unauthorized`] when neither key matches.
pub fn authorize(headers: &HeaderMap, config: &ServiceConfig) -> Result<()> {
    if !config.api_key.is_empty() {
        if let Some(value) = headers.get("x-api-key") {
            if constant_time_eq(value.as_bytes(), config.api_key.as_bytes()) {
                return Ok(());
            }
        }
    }

    if let Some(trust_key) = config.internal_trust_key.as_deref() {
        if !trust_key.is_empty() {
            if let Some(value) = headers.get("apikey") {
                if constant_time_eq(value.as_bytes(), trust_key.as_bytes()) {
                    return Ok(());
                }
            }
        }
    }

    Err(Error::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> ServiceConfig {
        ServiceConfig {
            api_key: "server-key".to_string(),
            internal_trust_key: Some("anon-key".to_string()),
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_api_key_header_authorizes() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("server-key"));
        assert!(authorize(&headers, &config()).is_ok());
    }

    #[test]
    fn test_internal_trust_header_authorizes() {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_static("anon-key"));
        assert!(authorize(&headers, &config()).is_ok());
    }

    #[test]
    fn test_missing_headers_are_rejected() {
        let err = authorize(&HeaderMap::new(), &config()).expect_err("must reject");
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("wrong"));
        assert!(authorize(&headers, &config()).is_err());
    }

    #[test]
    fn test_empty_configured_key_never_matches() {
        let config = ServiceConfig {
            api_key: String::new(),
            internal_trust_key: None,
            ..ServiceConfig::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static(""));
        assert!(authorize(&headers, &config).is_err());
    }
}
