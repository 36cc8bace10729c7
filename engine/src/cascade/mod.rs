//! Upward fill cascade
//!
//! Every chamber creation updates the two ancestors whose safes can see the
//! new chamber: the structural parent (`p1`) and the parent's parent
//! (`p2`). Each gets its fill count incremented once. Only `p2` can
//! complete (the new chamber sits on the second level of `p2`'s safe, and
//! second-level slots are the last to fill), so the completion check runs
//! at `p2` alone.
//!
//! # Critical Invariants
//!
//! 1. At most two ancestor writes per creation, always `p1` before `p2`
//! 2. A chamber's fill count reaches capacity exactly once, and the
//!    completion signal is returned at that moment only
//! 3. A missing ancestor stops the walk without raising anything further:
//!    the forest is built parent-first, so absence means external data
//!    corruption, reported rather than retried

use crate::coords::Location;
use crate::models::{ChamberId, MatrixState, ParticipantId, SAFE_CAPACITY};
use tracing::warn;

/// Signal that a chamber's safe just reached capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub chamber_id: ChamberId,
    pub location: Location,
    pub owner_id: ParticipantId,
    pub tier: u8,
}

/// Propagate one chamber creation to its two ancestors
///
/// Returns the completion signal if the second ancestor's safe reached
/// capacity. Genesis creations (no parent) propagate nothing.
pub fn propagate(state: &mut MatrixState, created: Location) -> Option<Completion> {
    let p1_location = created.parent()?;
    let p1_id = match load_ancestor(state, p1_location) {
        Some(id) => id,
        None => return None,
    };
    state.record_fill(p1_id);

    let p2_location = p1_location.parent()?;
    let p2_id = match load_ancestor(state, p2_location) {
        Some(id) => id,
        None => return None,
    };
    let fill = state.record_fill(p2_id);

    if fill == SAFE_CAPACITY {
        let completed = state.chamber(p2_id).expect("p2 loaded above");
        return Some(Completion {
            chamber_id: completed.id(),
            location: completed.location(),
            owner_id: completed.owner_id(),
            tier: completed.tier(),
        });
    }
    None
}

/// Load an ancestor chamber, reporting a structural gap if it is missing
fn load_ancestor(state: &MatrixState, location: Location) -> Option<ChamberId> {
    match state.chamber_at(location) {
        Some(chamber) => Some(chamber.id()),
        None => {
            warn!(%location, "ancestor chamber record not found");
            debug_assert!(false, "ancestor chamber missing at {}", location);
            None
        }
    }
}
