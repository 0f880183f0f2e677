//! Payment signature verification.
//!
//! The gateway signs `order_id|payment_id` with HMAC-SHA256 keyed by the
//! merchant secret and hex-encodes the digest.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Merchant signing secret. Never empty, never printed.
#[derive(Clone)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self, String> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err("signing secret must not be empty".to_string());
        }
        Ok(Self(secret))
    }

    /// The raw secret, for handing to the gateway's basic auth.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(****)")
    }
}

/// Hex-encoded HMAC-SHA256 of `order_id|payment_id`.
pub fn compute(secret: &SigningSecret, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `supplied` against the expected signature in constant time.
pub fn verify(secret: &SigningSecret, order_id: &str, payment_id: &str, supplied: &str) -> bool {
    let expected = compute(secret, order_id, payment_id);
    if expected.len() != supplied.len() {
        return false;
    }
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}
