//! Safe map assembly
//!
//! A chamber's safe spans 7 positions: the anchor itself, its 2 direct
//! descendant slots, and their 4 descendants. The map enumerates them in a
//! fixed total order: anchor, left, right, then the left slot's children
//! before the right slot's:
//!
//! ```text
//!              anchor            (row r)
//!            /        \
//!         left        right      (row r+1)
//!        /    \      /     \
//!      l.l    l.r  r.l     r.r   (row r+2)
//! ```
//!
//! This order is load-bearing: "first empty slot" during placement means
//! first in this enumeration.

use crate::coords::Location;
use crate::models::{ChamberId, MatrixState};

/// Position of a slot within a safe, in enumeration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Anchor,
    Left,
    Right,
    LeftLeft,
    LeftRight,
    RightLeft,
    RightRight,
}

impl SlotKey {
    /// All slot keys in enumeration order
    pub const ALL: [SlotKey; 7] = [
        SlotKey::Anchor,
        SlotKey::Left,
        SlotKey::Right,
        SlotKey::LeftLeft,
        SlotKey::LeftRight,
        SlotKey::RightLeft,
        SlotKey::RightRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKey::Anchor => "anchor",
            SlotKey::Left => "left",
            SlotKey::Right => "right",
            SlotKey::LeftLeft => "left_left",
            SlotKey::LeftRight => "left_right",
            SlotKey::RightLeft => "right_left",
            SlotKey::RightRight => "right_right",
        }
    }

    /// The slot's location relative to an anchor
    fn location_under(&self, anchor: Location) -> Location {
        match self {
            SlotKey::Anchor => anchor,
            SlotKey::Left => anchor.left_child(),
            SlotKey::Right => anchor.right_child(),
            SlotKey::LeftLeft => anchor.left_child().left_child(),
            SlotKey::LeftRight => anchor.left_child().right_child(),
            SlotKey::RightLeft => anchor.right_child().left_child(),
            SlotKey::RightRight => anchor.right_child().right_child(),
        }
    }
}

/// One enumerated safe position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeSlot {
    /// Which of the 7 positions this is
    pub key: SlotKey,

    /// The slot's location
    pub location: Location,

    /// Chamber occupying the slot, if any; `None` means the slot is open
    pub occupant: Option<ChamberId>,
}

/// The 7 positions of one anchor's safe, in enumeration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeMap {
    slots: [SafeSlot; 7],
}

impl SafeMap {
    pub fn slots(&self) -> &[SafeSlot; 7] {
        &self.slots
    }

    pub fn anchor(&self) -> &SafeSlot {
        &self.slots[0]
    }

    /// First open descendant slot, skipping the anchor's own position
    pub fn first_vacancy(&self) -> Option<&SafeSlot> {
        self.slots[1..].iter().find(|slot| slot.occupant.is_none())
    }

    /// Number of occupied positions, the anchor included
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.occupant.is_some()).count()
    }
}

/// Enumerate an anchor's safe and look up the occupant of each position
pub fn build_safe_map(state: &MatrixState, anchor: Location) -> SafeMap {
    let slots = SlotKey::ALL.map(|key| {
        let location = key.location_under(anchor);
        SafeSlot {
            key,
            location,
            occupant: state.chamber_at(location).map(|chamber| chamber.id()),
        }
    });
    SafeMap { slots }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnlockOrigin;

    fn seeded_state() -> (MatrixState, Location) {
        let mut state = MatrixState::new();
        let owner = state.create_participant("0xaaa".to_string());
        let root = Location::tier_root(1).unwrap();
        state.create_chamber(1, root, owner, UnlockOrigin::SelfRegistration);
        (state, root)
    }

    #[test]
    fn test_enumeration_order_is_fixed() {
        let (state, root) = seeded_state();
        let map = build_safe_map(&state, root);

        let keys: Vec<SlotKey> = map.slots().iter().map(|slot| slot.key).collect();
        assert_eq!(keys, SlotKey::ALL.to_vec());

        let locations: Vec<String> = map.slots().iter().map(|slot| slot.location.to_string()).collect();
        assert_eq!(
            locations,
            vec!["1.1.1", "1.2.1", "1.2.2", "1.3.1", "1.3.2", "1.3.3", "1.3.4"]
        );
    }

    #[test]
    fn test_occupants_reflect_existing_chambers() {
        let (mut state, root) = seeded_state();
        let other = state.create_participant("0xbbb".to_string());
        let left_id = state.create_chamber(1, root.left_child(), other, UnlockOrigin::SelfRegistration);

        let map = build_safe_map(&state, root);
        assert!(map.anchor().occupant.is_some());
        assert_eq!(map.slots()[1].occupant, Some(left_id));
        assert_eq!(map.slots()[2].occupant, None);
        assert_eq!(map.occupied_count(), 2);
    }

    #[test]
    fn test_first_vacancy_skips_anchor_and_follows_order() {
        let (mut state, root) = seeded_state();
        let other = state.create_participant("0xbbb".to_string());
        state.create_chamber(1, root.left_child(), other, UnlockOrigin::SelfRegistration);

        let map = build_safe_map(&state, root);
        let vacancy = map.first_vacancy().unwrap();
        assert_eq!(vacancy.key, SlotKey::Right);
        assert_eq!(vacancy.location, root.right_child());
    }

    #[test]
    fn test_full_safe_has_no_vacancy() {
        let (mut state, root) = seeded_state();
        let map = build_safe_map(&state, root);
        let descendants: Vec<Location> = map.slots()[1..].iter().map(|slot| slot.location).collect();

        for (i, location) in descendants.into_iter().enumerate() {
            let owner = state.create_participant(format!("0x{:03}", i));
            state.create_chamber(1, location, owner, UnlockOrigin::SelfRegistration);
        }

        let map = build_safe_map(&state, root);
        assert_eq!(map.occupied_count(), 7);
        assert!(map.first_vacancy().is_none());
    }
}
