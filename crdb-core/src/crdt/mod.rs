/*
    CRDT subsystem - replicated set datatypes

    Grow-only and two-phase sets with the binary wire format used for
    durable state, and the tagged state enum the database dispatches
    through.
*/

pub mod codec;
pub mod errors;
pub mod g_set;
pub mod state;
pub mod two_phase_set;

pub use errors::{CrdtError, CrdtResult};
pub use g_set::GSet;
pub use state::{
    GSetFactory, ResourceFactory, SetKind, SetState, TwoPhaseSetFactory, GSET_RESOURCE_TYPE,
    TWO_PHASE_SET_RESOURCE_TYPE,
};
pub use two_phase_set::TwoPhaseSet;
