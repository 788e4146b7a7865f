//! Webhook signature verification.
//!
//! GitHub signs each delivery with HMAC-SHA256 over the raw request body
//! and sends the result in the `X-Hub-Signature-256` header as
//! `sha256=<hex digest>`. Verification runs through [`ring::hmac::verify`]
//! so the comparison is constant time.

/// Header carrying the HMAC signature of the request body.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Scheme prefix on the signature header value.
const SCHEME_PREFIX: &str = "sha256=";

/// Errors produced by signature verification.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing X-Hub-Signature-256 header")]
    MissingHeader,
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute the `sha256=<hex>` header value for `body` under `secret`.
///
/// Used by tests and by operators generating deliveries by hand; the
/// server itself only verifies.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
    let tag = ring::hmac::sign(&key, body);
    format!("{SCHEME_PREFIX}{}", hex::encode(tag.as_ref()))
}

/// Verify a `sha256=<hex>` signature header against the raw request body.
pub fn verify(secret: &[u8], body: &[u8], header: &str) -> Result<(), SignatureError> {
    let digest = header
        .strip_prefix(SCHEME_PREFIX)
        .ok_or(SignatureError::MalformedHeader)?;
    let signature = hex::decode(digest).map_err(|_| SignatureError::MalformedHeader)?;
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret);
    ring::hmac::verify(&key, body, &signature).map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"it's a secret to everybody";

    #[test]
    fn sign_then_verify_accepts() {
        let body = br#"{"commits":[]}"#;
        let header = sign(SECRET, body);
        assert!(header.starts_with("sha256="));
        assert!(verify(SECRET, body, &header).is_ok());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = sign(SECRET, b"original");
        assert!(matches!(
            verify(SECRET, b"tampered", &header),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = sign(b"other secret", b"body");
        assert!(matches!(
            verify(SECRET, b"body", &header),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(matches!(
            verify(SECRET, b"body", "md5=abc"),
            Err(SignatureError::MalformedHeader)
        ));
        assert!(matches!(
            verify(SECRET, b"body", "sha256=not-hex"),
            Err(SignatureError::MalformedHeader)
        ));
    }
}
