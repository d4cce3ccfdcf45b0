//! HMAC-SHA256 signing of webhook bodies.

use crate::error::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the `X-Webhook-Signature` header value for a body.
///
/// The key is the raw secret bytes; the body must be the exact serialized
/// JSON sent on the wire. Format: `sha256=<lowercase hex digest>`.
///
/// # Errors
///
/// Returns an error if the MAC cannot be keyed.
pub fn signature_header(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Webhook(format!("invalid signing key: {e}")))?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(format!("sha256={}", hex::encode(digest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_format() {
        let header = signature_header("secret", b"{}").expect("sign");
        assert!(header.starts_with("sha256="));
        // 7 for the prefix plus 64 hex characters of SHA-256 output.
        assert_eq!(header.len(), 7 + 64);
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?".
        let header =
            signature_header("Jefe", b"what do ya want for nothing?").expect("sign");
        assert_eq!(
            header,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signature_depends_on_body_bytes() {
        let a = signature_header("secret", br#"{"a":1}"#).expect("sign");
        let b = signature_header("secret", br#"{"a": 1}"#).expect("sign");
        assert_ne!(a, b);
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let a = signature_header("secret-a", b"{}").expect("sign");
        let b = signature_header("secret-b", b"{}").expect("sign");
        assert_ne!(a, b);
    }
}
