/*
    g_set.rs - Grow-only set CRDT

    Membership is monotonically non-decreasing: insert is the only
    mutation and merge is set union, so replicas converge regardless of
    delivery order.

    Elements are opaque strings; the service layer base64-encodes raw
    payloads before insertion so the element domain stays canonical.
*/

use std::collections::HashSet;

use super::codec::{write_element, Reader};
use super::errors::CrdtResult;

/// Magic header for the G-Set durable format.
pub const GSET_MAGIC: &[u8] = b"crdt:gset\0";

/// Grow-only set CRDT
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GSet {
    elements: HashSet<String>,
}

impl GSet {
    /// Create a new empty G-Set
    pub fn new() -> Self {
        GSet {
            elements: HashSet::new(),
        }
    }

    /// Insert an element. Returns true iff it was not previously present.
    pub fn insert(&mut self, element: &str) -> bool {
        self.elements.insert(element.to_string())
    }

    /// Check whether an element is in the set
    pub fn contains(&self, element: &str) -> bool {
        self.elements.contains(element)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Merge another replica's state into this one (set union)
    pub fn merge(&mut self, other: &GSet) {
        for element in &other.elements {
            self.elements.insert(element.clone());
        }
    }

    /// Iterate the membership. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(String::as_str)
    }

    /// Append the durable form: magic, element count, element blocks.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(GSET_MAGIC);
        out.extend_from_slice(&(self.elements.len() as u64).to_le_bytes());
        for element in &self.elements {
            write_element(out, element.as_bytes());
        }
    }

    /// Decode one G-Set record from the cursor, merging its membership
    /// into this instance. Restoring a fresh replica is the same
    /// operation starting from the empty set.
    pub(crate) fn decode_merge(&mut self, reader: &mut Reader<'_>) -> CrdtResult<()> {
        reader.expect_magic(GSET_MAGIC)?;
        let count = reader.read_u64_le()?;

        for _ in 0..count {
            let bytes = reader.read_element()?;
            let element = std::str::from_utf8(bytes)
                .map_err(|_| super::errors::CrdtError::InvalidData)?;
            self.elements.insert(element.to_string());
        }
        Ok(())
    }
}
