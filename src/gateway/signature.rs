//! HMAC signature helpers shared by the webhook and verify paths.
//!
//! Webhook signatures are computed over the exact raw request bytes;
//! the synchronous verify digest is computed over
//! `"{remote_order_id}|{remote_payment_id}"`. Both are hex-encoded
//! HMAC-SHA256 and compared in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn hmac_sha256_hex(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies `provided` against the expected signature for `payload`.
pub fn verify_hmac_sha256(payload: &[u8], secret: &str, provided: &str) -> bool {
    constant_time_eq(&hmac_sha256_hex(payload, secret), provided)
}

/// Digest for the synchronous client-side verification path.
pub fn verify_digest_input(remote_order_id: &str, remote_payment_id: &str) -> String {
    format!("{}|{}", remote_order_id, remote_payment_id)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
