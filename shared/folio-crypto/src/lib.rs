//! Folio Webhook Cryptography
//!
//! HMAC-SHA256 signatures over webhook payloads.
//!
//! - **Senders** sign the exact serialized body with the endpoint's shared secret.
//! - **Receivers** recompute and compare in constant time with [`verify_signature`].

pub mod error;
pub mod signing;

pub use error::{CryptoError, Result};
pub use signing::{
    generate_signing_secret, sign_json, sign_payload, verify_signature, SIGNATURE_PREFIX,
};
