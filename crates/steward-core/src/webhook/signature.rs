//! Delivery signature verification.
//!
//! Deliveries are authenticated with an HMAC-SHA256 over the raw body,
//! hex-encoded in the `X-Hub-Signature-256` header with a `sha256=`
//! prefix. Comparison is constant-time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a delivery signature against the raw request body.
///
/// # Errors
///
/// Returns a [`WebhookError`] when the header is absent, not a
/// `sha256=`-prefixed hex digest, or does not match the payload.
pub fn verify_signature(secret: &[u8], body: &[u8], header: &str) -> Result<(), WebhookError> {
    let Some(hex_digest) = header.strip_prefix("sha256=") else {
        return Err(WebhookError::MalformedSignature(
            "expected sha256= prefix".to_string(),
        ));
    };
    let claimed = hex::decode(hex_digest)
        .map_err(|error| WebhookError::MalformedSignature(error.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|error| WebhookError::MalformedSignature(error.to_string()))?;
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.ct_eq(claimed.as_slice()).into() {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_valid_signature() {
        let header = sign(b"secret", b"{}");
        assert!(verify_signature(b"secret", b"{}", &header).is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = sign(b"other", b"{}");
        assert!(matches!(
            verify_signature(b"secret", b"{}", &header),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_tampered_body() {
        let header = sign(b"secret", b"{}");
        assert!(matches!(
            verify_signature(b"secret", b"{\"a\":1}", &header),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(matches!(
            verify_signature(b"secret", b"{}", "sha1=abcd"),
            Err(WebhookError::MalformedSignature(_))
        ));
        assert!(matches!(
            verify_signature(b"secret", b"{}", "sha256=zzzz"),
            Err(WebhookError::MalformedSignature(_))
        ));
    }
}
