/*
    errors.rs - Error types for the database core

    The vocabulary a client ultimately sees. The Display form of every
    variant is the stable `crdt:` wire kind; the service layer copies it
    into a failed Status verbatim.
*/

use thiserror::Error;

use crate::crdt::CrdtError;
use crate::crypto::CryptoError;
use crate::storage::StorageError;

/// Errors raised by database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Referenced datatype is not registered
    #[error("crdt:unknown-resource-type")]
    UnknownType,

    /// Empty datatype identifier supplied
    #[error("crdt:invalid-resource-type")]
    InvalidType,

    /// Referenced storage backend is not registered
    #[error("crdt:unknown-storage-type")]
    UnknownStorage,

    /// Referenced crypto method is not registered
    #[error("crdt:unknown-crypto-method")]
    UnknownCrypto,

    /// Storage does not hold the id and it is not live
    #[error("crdt:unknown-resource-id")]
    UnknownResource,

    /// Live table entry is missing for a mapped reference
    #[error("crdt:invalid-resource")]
    InvalidResource,

    /// Key is malformed or does not match the resource's key
    #[error("crdt:invalid-resource-key")]
    InvalidKey,

    /// Reference id is not mapped
    #[error("crdt:invalid-reference")]
    InvalidReference,

    /// Ciphertext or decoded payload is malformed
    #[error("crdt:invalid-resource-data")]
    InvalidResourceData,

    /// Cross-resource operation over different datatypes
    #[error("crdt:type-mismatch")]
    TypeMismatch,

    /// A plugin with this type id is already registered
    #[error("crdt:duplicate-plugin: {0}")]
    DuplicatePlugin(String),

    /// Storage backend failure
    #[error("crdt:storage-failure")]
    Storage(String),

    /// Should not happen
    #[error("crdt:internal-error")]
    Internal(String),

    /// CRDT mutation contract violation, wire kind passed through
    #[error(transparent)]
    Crdt(#[from] CrdtError),
}

impl From<CryptoError> for DatabaseError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKey => DatabaseError::InvalidKey,
            CryptoError::InvalidData => DatabaseError::InvalidResourceData,
            CryptoError::Backend(msg) => DatabaseError::Internal(msg),
        }
    }
}

impl From<StorageError> for DatabaseError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnknownResource => DatabaseError::UnknownResource,
            StorageError::InvalidLocator => DatabaseError::UnknownResource,
            StorageError::Io(msg) | StorageError::Backend(msg) => DatabaseError::Storage(msg),
        }
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DatabaseError>;
