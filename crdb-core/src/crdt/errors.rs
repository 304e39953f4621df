/*
    errors.rs - Error types for the CRDT subsystem

    The Display form of each variant is the stable wire kind string a
    client sees in a failed Status.
*/

use thiserror::Error;

/// Errors raised by CRDT operations and the binary codec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrdtError {
    /// Serialized payload is truncated, has a bad header, or fails a CRC
    #[error("crdt:invalid-resource-data")]
    InvalidData,

    /// Cross-instance operation over different CRDT kinds
    #[error("crdt:type-mismatch")]
    TypeMismatch,

    /// Element is tombstoned; two-phase removal is permanent
    #[error("crdt:error-already-removed")]
    AlreadyRemoved,

    /// Element already sits in the added component of a two-phase set
    #[error("crdt:error-already-inserted")]
    AlreadyInserted,

    /// Element already present in a grow-only set
    #[error("crdt:item-already-present")]
    AlreadyPresent,

    /// The datatype does not support the requested mutation
    #[error("crdt:unsupported-operation")]
    UnsupportedOperation,
}

/// Result type for CRDT operations
pub type CrdtResult<T> = Result<T, CrdtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_kind_strings() {
        assert_eq!(
            CrdtError::InvalidData.to_string(),
            "crdt:invalid-resource-data"
        );
        assert_eq!(
            CrdtError::AlreadyRemoved.to_string(),
            "crdt:error-already-removed"
        );
        assert_eq!(CrdtError::TypeMismatch.to_string(), "crdt:type-mismatch");
    }
}
