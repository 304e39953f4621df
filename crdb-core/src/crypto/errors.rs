/*
    errors.rs - Error types for the crypto subsystem
*/

use thiserror::Error;

/// Errors raised by cryptographic providers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key material has the wrong length, shape, or does not parse
    #[error("crdt:invalid-resource-key")]
    InvalidKey,

    /// Ciphertext is truncated, misaligned, or fails authentication
    #[error("crdt:invalid-resource-data")]
    InvalidData,

    /// The underlying primitive failed (key generation, encryption)
    #[error("crdt:crypto-failure")]
    Backend(String),
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
