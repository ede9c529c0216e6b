//! HMAC-SHA256 Webhook Signing
//!
//! Signs and verifies webhook payloads for authenticity.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::error::Result;

type HmacSha256 = Hmac<Sha256>;

/// Optional scheme prefix accepted on inbound signatures (`sha256=<hex>`).
pub const SIGNATURE_PREFIX: &str = "sha256=";

fn mac_for(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Sign a payload with HMAC-SHA256 and return the lowercase hex-encoded signature.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = mac_for(secret);
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Serialize `value` to JSON and sign the resulting bytes.
///
/// Returns the body together with its signature so callers send exactly
/// the bytes that were signed.
pub fn sign_json<T: Serialize>(secret: &str, value: &T) -> Result<(Vec<u8>, String)> {
    let body = serde_json::to_vec(value)?;
    let signature = sign_payload(secret, &body);
    Ok((body, signature))
}

/// Verify an HMAC-SHA256 signature against a payload.
///
/// Accepts the bare hex digest or the `sha256=`-prefixed form. The digest
/// comparison is constant-time; malformed hex is rejected up front.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let hex_digest = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(signature);

    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac = mac_for(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Generate a random 32-byte hex signing secret.
pub fn generate_signing_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}
