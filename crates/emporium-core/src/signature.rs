//! # Payment Signatures
//!
//! HMAC-SHA256 signatures used by the payment gateway.
//!
//! ```text
//! checkout callback:  hex(HMAC(key_secret,     "{order_id}|{payment_id}"))
//! webhook:            hex(HMAC(webhook_secret, raw request body))
//! ```
//!
//! Verification decodes the presented hex and compares MAC bytes in
//! constant time. Undecodable input and an empty secret fail closed.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

/// HMAC accepts a zero-length key, which anyone can reproduce.
fn keyed_mac(secret: &[u8]) -> CoreResult<HmacSha256> {
    if secret.is_empty() {
        return Err(CoreError::InvalidSignature);
    }
    HmacSha256::new_from_slice(secret).map_err(|_| CoreError::InvalidSignature)
}

/// Hex-encoded HMAC-SHA256 of `message`.
pub fn sign(secret: &[u8], message: &[u8]) -> CoreResult<String> {
    let mut mac = keyed_mac(secret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a hex signature over `message`.
pub fn verify(secret: &[u8], message: &[u8], signature_hex: &str) -> CoreResult<()> {
    let presented = hex::decode(signature_hex.trim()).map_err(|_| CoreError::InvalidSignature)?;

    let mut mac = keyed_mac(secret)?;
    mac.update(message);
    mac.verify_slice(&presented)
        .map_err(|_| CoreError::InvalidSignature)
}

/// Message signed by the gateway for a checkout callback.
pub fn payment_message(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

/// Verifies the signature returned to the storefront after checkout.
pub fn verify_payment(
    key_secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature_hex: &str,
) -> CoreResult<()> {
    let message = payment_message(gateway_order_id, gateway_payment_id);
    verify(key_secret.as_bytes(), message.as_bytes(), signature_hex)
}

/// Verifies a webhook delivery against its raw body.
pub fn verify_webhook(webhook_secret: &str, body: &[u8], signature_hex: &str) -> CoreResult<()> {
    verify(webhook_secret.as_bytes(), body, signature_hex)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_key_secret";

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign(SECRET.as_bytes(), b"order_1|pay_1").unwrap();
        let b = sign(SECRET.as_bytes(), b"order_1|pay_1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sign(SECRET.as_bytes(), b"order_1|pay_2").unwrap());
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let mac = sign(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_payment_roundtrip() {
        let sig = sign(SECRET.as_bytes(), payment_message("order_1", "pay_1").as_bytes()).unwrap();
        assert!(verify_payment(SECRET, "order_1", "pay_1", &sig).is_ok());
        assert!(verify_payment(SECRET, "order_1", "pay_2", &sig).is_err());
        assert!(verify_payment("other", "order_1", "pay_1", &sig).is_err());
    }

    #[test]
    fn test_single_bit_flip_rejected() {
        let sig = sign(SECRET.as_bytes(), b"order_1|pay_1").unwrap();
        let mut bytes = hex::decode(&sig).unwrap();
        bytes[0] ^= 0x01;
        let flipped = hex::encode(bytes);

        let err = verify(SECRET.as_bytes(), b"order_1|pay_1", &flipped).unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignature));
    }

    #[test]
    fn test_malformed_hex_fails_closed() {
        assert!(verify(SECRET.as_bytes(), b"x", "not-hex").is_err());
        assert!(verify(SECRET.as_bytes(), b"x", "").is_err());
        assert!(verify(SECRET.as_bytes(), b"x", "abcd").is_err());
    }

    #[test]
    fn test_empty_secret_fails_closed() {
        assert!(matches!(sign(b"", b"order_1|pay_1"), Err(CoreError::InvalidSignature)));

        // What an attacker would compute against an unconfigured secret
        let mut mac = HmacSha256::new_from_slice(b"").unwrap();
        mac.update(b"order_1|pay_1");
        let forged = hex::encode(mac.finalize().into_bytes());
        assert!(verify_payment("", "order_1", "pay_1", &forged).is_err());
        assert!(verify_webhook("", b"order_1|pay_1", &forged).is_err());
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = sign(b"whsec", body).unwrap();
        assert!(verify_webhook("whsec", body, &sig).is_ok());
        assert!(verify_webhook("whsec", b"{}", &sig).is_err());
    }
}
