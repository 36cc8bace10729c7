//! Property tests for the location codec
//!
//! Exercises the codec laws across the coordinate space rather than at
//! hand-picked points.

use khazon_matrix_core_rs::Location;
use proptest::prelude::*;

/// Strategy: any valid location with a row small enough to have room for
/// two more generations of descendants
fn arb_location() -> impl Strategy<Value = Location> {
    (1u8..=7, 1u32..=20).prop_flat_map(|(tier, row)| {
        let row_width = 1u64 << (row - 1);
        (Just(tier), Just(row), 1u64..=row_width)
            .prop_map(|(tier, row, pos)| Location::new(tier, row, pos).unwrap())
    })
}

proptest! {
    #[test]
    fn prop_parse_display_round_trip(location in arb_location()) {
        let text = location.to_string();
        let parsed: Location = text.parse().unwrap();
        prop_assert_eq!(parsed, location);
    }

    #[test]
    fn prop_children_invert_through_parent(anchor in arb_location()) {
        prop_assert_eq!(anchor.left_child().parent(), Some(anchor));
        prop_assert_eq!(anchor.right_child().parent(), Some(anchor));
    }

    #[test]
    fn prop_two_hops_from_any_grandchild_reach_the_anchor(anchor in arb_location()) {
        let grandchildren = [
            anchor.left_child().left_child(),
            anchor.left_child().right_child(),
            anchor.right_child().left_child(),
            anchor.right_child().right_child(),
        ];
        for slot in grandchildren {
            let anchor_again = slot.parent().unwrap().parent().unwrap();
            prop_assert_eq!(anchor_again, anchor);
        }
    }

    #[test]
    fn prop_safe_positions_are_distinct(anchor in arb_location()) {
        let positions = [
            anchor,
            anchor.left_child(),
            anchor.right_child(),
            anchor.left_child().left_child(),
            anchor.left_child().right_child(),
            anchor.right_child().left_child(),
            anchor.right_child().right_child(),
        ];
        let unique: std::collections::HashSet<_> = positions.iter().collect();
        prop_assert_eq!(unique.len(), positions.len());
    }

    #[test]
    fn prop_distinct_siblings_have_the_same_parent_but_never_collide(anchor in arb_location()) {
        let left = anchor.left_child();
        let right = anchor.right_child();
        prop_assert_ne!(left, right);
        prop_assert_eq!(left.parent(), right.parent());
    }

    #[test]
    fn prop_parent_strictly_reduces_row_until_the_root(location in arb_location()) {
        let mut current = location;
        let mut hops: u32 = 0;
        while let Some(parent) = current.parent() {
            prop_assert_eq!(parent.row(), current.row() - 1);
            prop_assert_eq!(parent.tier(), current.tier());
            current = parent;
            hops += 1;
        }
        prop_assert!(current.is_tier_root());
        prop_assert_eq!(hops, location.row() - 1);
    }
}
