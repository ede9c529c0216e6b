//! Cryptography error types.

use thiserror::Error;

/// Errors raised while preparing a payload for signing.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
