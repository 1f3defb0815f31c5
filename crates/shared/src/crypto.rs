//! HMAC-SHA256 signing for webhook payloads.
//!
//! Signatures are rendered as `sha256=<lowercase hex>` and sent in the
//! `X-Signature` header so receivers can authenticate the payload.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix identifying the digest algorithm in a rendered signature.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Errors raised while computing a signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Signs `payload` with `secret` and returns `sha256=<hex>`.
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(payload);
    let digest = mac.finalize().into_bytes();

    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(digest)))
}

/// Verifies a `sha256=<hex>` signature in constant time.
///
/// Returns `false` for a missing prefix, malformed hex, or a digest mismatch.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(hex_digest) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = br#"{"orderId":"ord_123","total":4200}"#;

    #[test]
    fn test_sign_payload_format() {
        let signature = sign_payload("whsec_test", PAYLOAD).unwrap();
        assert!(signature.starts_with("sha256="));
        // 32 byte digest = 64 hex chars
        assert_eq!(signature.len(), SIGNATURE_PREFIX.len() + 64);
        assert!(signature[SIGNATURE_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sign_payload_known_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_sign_payload_deterministic() {
        let a = sign_payload("secret", PAYLOAD).unwrap();
        let b = sign_payload("secret", PAYLOAD).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_payload_depends_on_secret() {
        let a = sign_payload("secret-a", PAYLOAD).unwrap();
        let b = sign_payload("secret-b", PAYLOAD).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_signature_accepts_exact_payload() {
        let signature = sign_payload("secret", PAYLOAD).unwrap();
        assert!(verify_signature("secret", PAYLOAD, &signature));
    }

    #[test]
    fn test_verify_signature_rejects_any_flipped_byte() {
        let signature = sign_payload("secret", PAYLOAD).unwrap();
        for i in 0..PAYLOAD.len() {
            let mut tampered = PAYLOAD.to_vec();
            tampered[i] ^= 0x01;
            assert!(
                !verify_signature("secret", &tampered, &signature),
                "flipping byte {} should invalidate the signature",
                i
            );
        }
    }

    #[test]
    fn test_verify_signature_rejects_wrong_secret() {
        let signature = sign_payload("secret", PAYLOAD).unwrap();
        assert!(!verify_signature("other", PAYLOAD, &signature));
    }

    #[test]
    fn test_verify_signature_rejects_malformed() {
        assert!(!verify_signature("secret", PAYLOAD, ""));
        assert!(!verify_signature("secret", PAYLOAD, "sha1=abcd"));
        assert!(!verify_signature("secret", PAYLOAD, "sha256=not-hex"));
        assert!(!verify_signature("secret", PAYLOAD, "sha256=abcd"));
    }
}
