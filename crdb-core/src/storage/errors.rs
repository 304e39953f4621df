/*
    errors.rs - Error types for the storage subsystem
*/

use thiserror::Error;

/// Errors raised by storage providers
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend does not hold the requested id
    #[error("crdt:unknown-resource-id")]
    UnknownResource,

    /// The opaque locator is malformed for this backend
    #[error("crdt:invalid-resource-id")]
    InvalidLocator,

    /// Filesystem failure underneath the provider
    #[error("crdt:storage-failure")]
    Io(String),

    /// Object store or name resolution failure
    #[error("crdt:storage-failure")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
