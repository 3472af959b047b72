//! HMAC-SHA256 payload signing.
//!
//! The signature covers the exact request body and travels as
//! `X-Webhook-Signature: sha256=<hex>`. Receivers verify with nothing but
//! the shared secret — this header format is a compatibility contract.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 of a payload body.
#[must_use]
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// The full `X-Webhook-Signature` header value for a payload body.
#[must_use]
pub fn signature_header(secret: &str, body: &[u8]) -> String {
    format!("sha256={}", compute_signature(secret, body))
}

/// Verify a received `sha256=<hex>` header value in constant time.
#[must_use]
pub fn verify_signature(header_value: &str, secret: &str, body: &[u8]) -> bool {
    let Some(received) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    constant_time_eq(
        received.as_bytes(),
        compute_signature(secret, body).as_bytes(),
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic() {
        assert_eq!(
            compute_signature("secret", b"payload"),
            compute_signature("secret", b"payload")
        );
    }

    #[test]
    fn signature_changes_with_secret_and_body() {
        let base = compute_signature("secret", b"payload");
        assert_ne!(base, compute_signature("other", b"payload"));
        assert_ne!(base, compute_signature("secret", b"payload2"));
    }

    #[test]
    fn header_format_is_sha256_hex() {
        let header = signature_header("secret", b"payload");
        assert!(header.starts_with("sha256="));
        let hex_part = &header[7..];
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn receiver_can_verify_independently() {
        let secret = "whsec_1234";
        let body = br#"{"event":"job.completed"}"#;
        let header = signature_header(secret, body);
        assert!(verify_signature(&header, secret, body));
    }

    #[test]
    fn verification_rejects_tampering() {
        let header = signature_header("secret", b"original");
        assert!(!verify_signature(&header, "secret", b"tampered"));
        assert!(!verify_signature(&header, "wrong", b"original"));
        assert!(!verify_signature("md5=abc", "secret", b"original"));
    }
}
