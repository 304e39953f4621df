/*
    two_phase_set.rs - Two-phase set CRDT

    Two grow-only components: added and removed. Removal tombstones an
    element permanently; a removed element can never be re-inserted.
    Invariant: removed is a subset of added at all times.
*/

use super::codec::Reader;
use super::errors::{CrdtError, CrdtResult};
use super::g_set::GSet;

/// Magic header for the 2P-Set durable format.
pub const TWO_PHASE_MAGIC: &[u8] = b"crdt:2pset\0";

/// Two-phase set CRDT
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwoPhaseSet {
    added: GSet,
    removed: GSet,
}

impl TwoPhaseSet {
    /// Create a new empty 2P-Set
    pub fn new() -> Self {
        TwoPhaseSet {
            added: GSet::new(),
            removed: GSet::new(),
        }
    }

    /// Insert an element.
    ///
    /// Returns `Ok(true)` on first insertion, `Ok(false)` when the
    /// element already sits in the added component, and
    /// `AlreadyRemoved` when it has been tombstoned.
    pub fn insert(&mut self, element: &str) -> CrdtResult<bool> {
        if self.removed.contains(element) {
            return Err(CrdtError::AlreadyRemoved);
        }
        Ok(self.added.insert(element))
    }

    /// Remove an element.
    ///
    /// Returns `Ok(false)` when the element was never inserted,
    /// `AlreadyRemoved` when it is already tombstoned, and `Ok(true)`
    /// once the tombstone is recorded.
    pub fn remove(&mut self, element: &str) -> CrdtResult<bool> {
        if self.removed.contains(element) {
            return Err(CrdtError::AlreadyRemoved);
        }
        if !self.added.contains(element) {
            return Ok(false);
        }
        Ok(self.removed.insert(element))
    }

    /// An element is observed iff added and not tombstoned.
    pub fn contains(&self, element: &str) -> bool {
        self.added.contains(element) && !self.removed.contains(element)
    }

    /// Observable cardinality. Tombstones never outnumber additions.
    pub fn len(&self) -> usize {
        self.added.len() - self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Componentwise union with another replica's state.
    pub fn merge(&mut self, other: &TwoPhaseSet) {
        self.added.merge(&other.added);
        self.removed.merge(&other.removed);
    }

    /// Iterate the observable membership. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.added.iter().filter(|e| !self.removed.contains(e))
    }

    /// Append the durable form: magic, then added and removed in G-Set
    /// format.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(TWO_PHASE_MAGIC);
        self.added.encode(out);
        self.removed.encode(out);
    }

    /// Decode one 2P-Set record from the cursor, merging both components
    /// into this instance.
    pub(crate) fn decode_merge(&mut self, reader: &mut Reader<'_>) -> CrdtResult<()> {
        reader.expect_magic(TWO_PHASE_MAGIC)?;
        self.added.decode_merge(reader)?;
        self.removed.decode_merge(reader)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> CrdtResult<TwoPhaseSet> {
        let mut set = TwoPhaseSet::new();
        let mut reader = Reader::new(bytes);
        set.decode_merge(&mut reader)?;
        Ok(set)
    }

    #[test]
    fn test_insert_remove_contains() {
        let mut set = TwoPhaseSet::new();

        assert_eq!(set.insert("x"), Ok(true));
        assert!(set.contains("x"));
        assert_eq!(set.len(), 1);

        assert_eq!(set.remove("x"), Ok(true));
        assert!(!set.contains("x"));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_tombstone_is_permanent() {
        let mut set = TwoPhaseSet::new();

        set.insert("x").unwrap();
        set.remove("x").unwrap();

        assert_eq!(set.insert("x"), Err(CrdtError::AlreadyRemoved));
        assert_eq!(set.remove("x"), Err(CrdtError::AlreadyRemoved));
        assert!(!set.contains("x"));
    }

    #[test]
    fn test_remove_of_unknown_element_reports_false() {
        let mut set = TwoPhaseSet::new();
        assert_eq!(set.remove("ghost"), Ok(false));
    }

    #[test]
    fn test_duplicate_insert_reports_false() {
        let mut set = TwoPhaseSet::new();
        assert_eq!(set.insert("x"), Ok(true));
        assert_eq!(set.insert("x"), Ok(false));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_merge_carries_tombstones() {
        let mut a = TwoPhaseSet::new();
        let mut b = TwoPhaseSet::new();

        a.insert("keep").unwrap();
        b.insert("gone").unwrap();
        b.remove("gone").unwrap();

        a.merge(&b);
        assert!(a.contains("keep"));
        assert!(!a.contains("gone"));
        assert_eq!(a.insert("gone"), Err(CrdtError::AlreadyRemoved));
    }

    #[test]
    fn test_iter_skips_tombstones() {
        let mut set = TwoPhaseSet::new();
        set.insert("a").unwrap();
        set.insert("b").unwrap();
        set.remove("a").unwrap();

        let visible: Vec<&str> = set.iter().collect();
        assert_eq!(visible, vec!["b"]);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut set = TwoPhaseSet::new();
        set.insert("one").unwrap();
        set.insert("two").unwrap();
        set.remove("one").unwrap();

        let mut bytes = Vec::new();
        set.encode(&mut bytes);

        let restored = decode(&bytes).unwrap();
        assert_eq!(set, restored);
        assert!(!restored.contains("one"));
        assert!(restored.contains("two"));
    }

    #[test]
    fn test_decode_merge_preserves_tombstones_across_payloads() {
        let mut a = TwoPhaseSet::new();
        a.insert("x").unwrap();

        let mut b = TwoPhaseSet::new();
        b.insert("x").unwrap();
        b.remove("x").unwrap();

        let mut a_bytes = Vec::new();
        a.encode(&mut a_bytes);
        let mut b_bytes = Vec::new();
        b.encode(&mut b_bytes);

        let mut merged = decode(&a_bytes).unwrap();
        let mut reader = Reader::new(&b_bytes);
        merged.decode_merge(&mut reader).unwrap();

        assert!(!merged.contains("x"));
        assert_eq!(merged.insert("x"), Err(CrdtError::AlreadyRemoved));
    }

    #[test]
    fn test_truncated_second_component_fails() {
        let mut set = TwoPhaseSet::new();
        set.insert("one").unwrap();
        set.remove("one").unwrap();

        let mut bytes = Vec::new();
        set.encode(&mut bytes);
        bytes.truncate(bytes.len() - 1);

        assert_eq!(decode(&bytes), Err(CrdtError::InvalidData));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn build(inserts: &[String], removes: &[String]) -> TwoPhaseSet {
        let mut set = TwoPhaseSet::new();
        for e in inserts {
            let _ = set.insert(e);
        }
        for e in removes {
            let _ = set.remove(e);
        }
        set
    }

    // Property: merging is commutative
    proptest! {
        #[test]
        fn prop_merge_commutative(
            ins_a in prop::collection::vec("[a-d]{1,3}", 0..8),
            rem_a in prop::collection::vec("[a-d]{1,3}", 0..4),
            ins_b in prop::collection::vec("[a-d]{1,3}", 0..8),
            rem_b in prop::collection::vec("[a-d]{1,3}", 0..4),
        ) {
            let a = build(&ins_a, &rem_a);
            let b = build(&ins_b, &rem_b);

            let mut ab = a.clone();
            ab.merge(&b);
            let mut ba = b.clone();
            ba.merge(&a);

            prop_assert_eq!(ab, ba);
        }
    }

    // Property: merge is idempotent
    proptest! {
        #[test]
        fn prop_merge_idempotent(
            inserts in prop::collection::vec("[a-d]{1,3}", 0..8),
            removes in prop::collection::vec("[a-d]{1,3}", 0..4),
        ) {
            let a = build(&inserts, &removes);
            let mut merged = a.clone();
            merged.merge(&a);
            prop_assert_eq!(merged, a);
        }
    }

    // Property: a tombstoned element never resurfaces through merge
    proptest! {
        #[test]
        fn prop_tombstone_survives_merge(element in "[a-z]{1,6}") {
            let mut alive = TwoPhaseSet::new();
            alive.insert(&element).unwrap();

            let mut dead = alive.clone();
            dead.remove(&element).unwrap();

            let mut merged = alive.clone();
            merged.merge(&dead);

            prop_assert!(!merged.contains(&element));
            prop_assert_eq!(merged.insert(&element), Err(CrdtError::AlreadyRemoved));
        }
    }

    // Property: encode then decode is the identity
    proptest! {
        #[test]
        fn prop_codec_round_trip(
            inserts in prop::collection::vec("[ -~]{0,12}", 0..10),
            removes in prop::collection::vec("[ -~]{0,12}", 0..5),
        ) {
            let set = build(&inserts, &removes);

            let mut bytes = Vec::new();
            set.encode(&mut bytes);

            let mut restored = TwoPhaseSet::new();
            let mut reader = Reader::new(&bytes);
            restored.decode_merge(&mut reader).unwrap();

            prop_assert_eq!(restored, set);
        }
    }
}
