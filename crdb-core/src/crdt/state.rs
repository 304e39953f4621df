/*
    state.rs - Tagged state enum and datatype factories

    The database dispatches over an exhaustive enum of CRDT kinds rather
    than downcasting. Cross-resource operations (merge, equals) check the
    kind once and fail with TypeMismatch instead of reflecting on the
    concrete type.
*/

use super::codec::Reader;
use super::errors::{CrdtError, CrdtResult};
use super::g_set::GSet;
use super::two_phase_set::TwoPhaseSet;
use crate::resource::ResourceType;

/// Datatype tag of the grow-only set.
pub const GSET_RESOURCE_TYPE: &str = "crdt:gset";

/// Datatype tag of the two-phase set.
pub const TWO_PHASE_SET_RESOURCE_TYPE: &str = "crdt:2pset";

/// Discriminant of a set state, used where only the kind matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    GrowOnly,
    TwoPhase,
}

/// The state of a live set resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetState {
    GrowOnly(GSet),
    TwoPhase(TwoPhaseSet),
}

impl SetState {
    pub fn kind(&self) -> SetKind {
        match self {
            SetState::GrowOnly(_) => SetKind::GrowOnly,
            SetState::TwoPhase(_) => SetKind::TwoPhase,
        }
    }

    /// The type tag written in front of the durable payload.
    pub fn type_tag(&self) -> &'static str {
        match self {
            SetState::GrowOnly(_) => GSET_RESOURCE_TYPE,
            SetState::TwoPhase(_) => TWO_PHASE_SET_RESOURCE_TYPE,
        }
    }

    /// Insert an element. `Ok(false)` means it was already present.
    pub fn insert(&mut self, element: &str) -> CrdtResult<bool> {
        match self {
            SetState::GrowOnly(set) => Ok(set.insert(element)),
            SetState::TwoPhase(set) => set.insert(element),
        }
    }

    /// Remove an element. Grow-only sets reject removal outright.
    pub fn remove(&mut self, element: &str) -> CrdtResult<bool> {
        match self {
            SetState::GrowOnly(_) => Err(CrdtError::UnsupportedOperation),
            SetState::TwoPhase(set) => set.remove(element),
        }
    }

    pub fn contains(&self, element: &str) -> bool {
        match self {
            SetState::GrowOnly(set) => set.contains(element),
            SetState::TwoPhase(set) => set.contains(element),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SetState::GrowOnly(set) => set.len(),
            SetState::TwoPhase(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the observable membership. Order is unspecified. The
    /// iterator is Send so a stream producer can hold it across
    /// suspension points.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &str> + Send + '_> {
        match self {
            SetState::GrowOnly(set) => Box::new(set.iter()),
            SetState::TwoPhase(set) => Box::new(set.iter()),
        }
    }

    /// Structural equality between same-kind states.
    pub fn equals(&self, other: &SetState) -> CrdtResult<bool> {
        match (self, other) {
            (SetState::GrowOnly(a), SetState::GrowOnly(b)) => Ok(a == b),
            (SetState::TwoPhase(a), SetState::TwoPhase(b)) => Ok(a == b),
            _ => Err(CrdtError::TypeMismatch),
        }
    }

    /// Merge another state into this one. Commutative, associative,
    /// idempotent for both kinds.
    pub fn merge(&mut self, other: &SetState) -> CrdtResult<()> {
        match (self, other) {
            (SetState::GrowOnly(a), SetState::GrowOnly(b)) => {
                a.merge(b);
                Ok(())
            }
            (SetState::TwoPhase(a), SetState::TwoPhase(b)) => {
                a.merge(b);
                Ok(())
            }
            _ => Err(CrdtError::TypeMismatch),
        }
    }

    /// The durable binary form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            SetState::GrowOnly(set) => set.encode(&mut out),
            SetState::TwoPhase(set) => set.encode(&mut out),
        }
        out
    }

    /// Decode a durable payload into this instance, merging membership.
    /// Trailing bytes after the record are malformed input.
    pub fn decode_merge(&mut self, bytes: &[u8]) -> CrdtResult<()> {
        let mut reader = Reader::new(bytes);
        match self {
            SetState::GrowOnly(set) => set.decode_merge(&mut reader)?,
            SetState::TwoPhase(set) => set.decode_merge(&mut reader)?,
        }
        if !reader.is_empty() {
            return Err(CrdtError::InvalidData);
        }
        Ok(())
    }
}

/// Builds fresh and restored states for one registered datatype.
pub trait ResourceFactory: Send + Sync {
    /// The datatype tag this factory serves.
    fn type_id(&self) -> ResourceType;

    /// A fresh, empty state.
    fn create(&self) -> SetState;

    /// Reconstruct a state from one durable payload.
    fn restore(&self, payload: &[u8]) -> CrdtResult<SetState> {
        let mut state = self.create();
        state.decode_merge(payload)?;
        Ok(state)
    }
}

/// Factory for grow-only sets.
pub struct GSetFactory;

impl ResourceFactory for GSetFactory {
    fn type_id(&self) -> ResourceType {
        ResourceType::from(GSET_RESOURCE_TYPE)
    }

    fn create(&self) -> SetState {
        SetState::GrowOnly(GSet::new())
    }
}

/// Factory for two-phase sets.
pub struct TwoPhaseSetFactory;

impl ResourceFactory for TwoPhaseSetFactory {
    fn type_id(&self) -> ResourceType {
        ResourceType::from(TWO_PHASE_SET_RESOURCE_TYPE)
    }

    fn create(&self) -> SetState {
        SetState::TwoPhase(TwoPhaseSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags() {
        assert_eq!(GSetFactory.create().type_tag(), "crdt:gset");
        assert_eq!(TwoPhaseSetFactory.create().type_tag(), "crdt:2pset");
    }

    #[test]
    fn test_remove_on_grow_only_is_unsupported() {
        let mut state = GSetFactory.create();
        state.insert("x").unwrap();
        assert_eq!(state.remove("x"), Err(CrdtError::UnsupportedOperation));
        assert!(state.contains("x"));
    }

    #[test]
    fn test_cross_kind_merge_is_type_mismatch() {
        let mut gset = GSetFactory.create();
        let twop = TwoPhaseSetFactory.create();

        assert_eq!(gset.merge(&twop), Err(CrdtError::TypeMismatch));
        assert_eq!(gset.equals(&twop), Err(CrdtError::TypeMismatch));
    }

    #[test]
    fn test_restore_round_trip() {
        let mut state = TwoPhaseSetFactory.create();
        state.insert("a").unwrap();
        state.insert("b").unwrap();
        state.remove("a").unwrap();

        let payload = state.encode();
        let restored = TwoPhaseSetFactory.restore(&payload).unwrap();

        assert!(state.equals(&restored).unwrap());
    }

    #[test]
    fn test_restore_rejects_wrong_kind_payload() {
        let mut gset = GSetFactory.create();
        gset.insert("a").unwrap();
        let payload = gset.encode();

        assert_eq!(
            TwoPhaseSetFactory.restore(&payload),
            Err(CrdtError::InvalidData)
        );
    }

    #[test]
    fn test_restore_rejects_trailing_garbage() {
        let mut gset = GSetFactory.create();
        gset.insert("a").unwrap();
        let mut payload = gset.encode();
        payload.extend_from_slice(b"junk");

        assert_eq!(GSetFactory.restore(&payload), Err(CrdtError::InvalidData));
    }

    #[test]
    fn test_merge_convergence_across_states() {
        let mut a = GSetFactory.create();
        let mut b = GSetFactory.create();
        for e in ["1", "2", "3"] {
            a.insert(e).unwrap();
        }
        for e in ["3", "4", "5"] {
            b.insert(e).unwrap();
        }

        let mut ab = a.clone();
        ab.merge(&b).unwrap();
        let mut ba = b.clone();
        ba.merge(&a).unwrap();

        assert!(ab.equals(&ba).unwrap());
        assert_eq!(ab.len(), 5);
    }
}
