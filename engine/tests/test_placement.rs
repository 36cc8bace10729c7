//! Placement allocation tests
//!
//! Covers anchor resolution for registration: genesis bootstrap, honored
//! uplines, fallback to the earliest open anchor, and capacity failures.

use khazon_matrix_core_rs::{
    AnchorResolution, EngineError, MatrixConfig, MatrixEngine, MountingPolicy, PlacementError,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Engine with a default config and no participants
fn new_engine() -> MatrixEngine {
    MatrixEngine::new(MatrixConfig::default()).unwrap()
}

/// Add a participant with a generated address
fn add_member(engine: &mut MatrixEngine, tag: usize) -> u64 {
    engine.add_participant(format!("0x{:040x}", tag)).unwrap()
}

/// Fill the founder's safe: founder enrolls as genesis, six members enroll
/// beneath them. Returns (founder, members).
fn fill_founder_safe(engine: &mut MatrixEngine) -> (u64, Vec<u64>) {
    let founder = add_member(engine, 0);
    engine.enroll(founder, None).unwrap();

    let mut members = Vec::new();
    for i in 1..=6 {
        let member = add_member(engine, i);
        engine.enroll(member, Some(founder)).unwrap();
        members.push(member);
    }
    (founder, members)
}

// ============================================================================
// Genesis Bootstrap
// ============================================================================

#[test]
fn test_first_registration_creates_genesis_at_tier_root() {
    let mut engine = new_engine();
    let founder = add_member(&mut engine, 0);

    let receipt = engine.enroll(founder, None).unwrap();

    assert_eq!(receipt.location.to_string(), "1.1.1");
    assert_eq!(receipt.tier, 1);
    assert_eq!(receipt.resolution, AnchorResolution::Genesis);
    assert_eq!(receipt.safes_completed, 0);

    let genesis = engine.state().chamber(receipt.chamber_id).unwrap();
    assert_eq!(genesis.fill_count(), 1);
    assert_eq!(genesis.owner_id(), founder);

    // Genesis owners have no upline to record.
    assert_eq!(engine.state().participant(founder).unwrap().mounting(), None);
}

#[test]
fn test_second_registration_lands_on_first_descendant_slot() {
    let mut engine = new_engine();
    let founder = add_member(&mut engine, 0);
    let genesis = engine.enroll(founder, None).unwrap();

    let member = add_member(&mut engine, 1);
    let receipt = engine.enroll(member, Some(founder)).unwrap();

    assert_eq!(receipt.location.to_string(), "1.2.1");
    assert_eq!(receipt.resolution, AnchorResolution::Honored);

    // One ancestor hop only: the new chamber's second hop does not exist.
    let genesis = engine.state().chamber(genesis.chamber_id).unwrap();
    assert_eq!(genesis.fill_count(), 2);
}

// ============================================================================
// Anchor Resolution
// ============================================================================

#[test]
fn test_registration_without_upline_uses_earliest_open_anchor() {
    let mut engine = new_engine();
    let founder = add_member(&mut engine, 0);
    engine.enroll(founder, None).unwrap();

    let member = add_member(&mut engine, 1);
    let receipt = engine.enroll(member, None).unwrap();

    assert_eq!(receipt.resolution, AnchorResolution::Auto);
    assert_eq!(receipt.location.to_string(), "1.2.1");

    // Automatic placements record the selected anchor's owner.
    let mounting = engine.state().participant(member).unwrap().mounting().unwrap();
    assert_eq!(mounting.upline_id, founder);
    assert_eq!(mounting.policy, MountingPolicy::Auto);
}

#[test]
fn test_full_upline_falls_back_to_earliest_open_anchor() {
    let mut engine = new_engine();
    let (founder, members) = fill_founder_safe(&mut engine);
    assert!(engine.state().chambers_of(founder)[0].is_complete());

    // The founder's safe is full; the request must be adjusted, never
    // placed under the full anchor again.
    let late = add_member(&mut engine, 7);
    let receipt = engine.enroll(late, Some(founder)).unwrap();

    assert_eq!(receipt.resolution, AnchorResolution::Adjusted);
    assert_eq!(receipt.location.to_string(), "1.4.1");

    // Two hops up from the assigned slot sits the adjusted anchor: the
    // earliest-created open chamber, owned by the first member placed.
    let anchor = receipt.location.parent().unwrap().parent().unwrap();
    let anchor_chamber = engine.state().chamber_at(anchor).unwrap();
    assert_eq!(anchor_chamber.owner_id(), members[0]);
    assert!(!anchor_chamber.is_complete());

    // The mounting record keeps the upline that was asked for.
    let mounting = engine.state().participant(late).unwrap().mounting().unwrap();
    assert_eq!(mounting.upline_id, founder);
    assert_eq!(mounting.policy, MountingPolicy::Adjusted);
}

#[test]
fn test_fallback_disabled_surfaces_invalid_anchor() {
    let config = MatrixConfig {
        fallback_on_full_upline: false,
        ..MatrixConfig::default()
    };
    let mut engine = MatrixEngine::new(config).unwrap();
    let (founder, _) = fill_founder_safe(&mut engine);

    let late = add_member(&mut engine, 7);
    let result = engine.enroll(late, Some(founder));

    assert_eq!(
        result,
        Err(EngineError::Placement(PlacementError::InvalidAnchor { tier: 1 }))
    );
    // The rejected registration left nothing behind.
    assert_eq!(engine.state().chambers_of(late).len(), 0);
    assert_eq!(engine.state().participant(late).unwrap().referrer(), None);
}

// ============================================================================
// Slot Ordering
// ============================================================================

#[test]
fn test_slots_fill_in_enumeration_order() {
    let mut engine = new_engine();
    let founder = add_member(&mut engine, 0);
    engine.enroll(founder, None).unwrap();

    let expected = ["1.2.1", "1.2.2", "1.3.1", "1.3.2", "1.3.3", "1.3.4"];
    for (i, slot) in expected.iter().enumerate() {
        let member = add_member(&mut engine, i + 1);
        let receipt = engine.enroll(member, Some(founder)).unwrap();
        assert_eq!(receipt.location.to_string(), *slot);
    }
}

#[test]
fn test_safe_map_reports_occupancy() {
    let mut engine = new_engine();
    let (_, members) = fill_founder_safe(&mut engine);

    let map = engine.safe_map("1.1.1".parse().unwrap());
    assert_eq!(map.occupied_count(), 7);
    assert!(map.first_vacancy().is_none());
    assert_eq!(map.slots()[0].key.as_str(), "anchor");

    // The slot occupants are the members, in enumeration order.
    let occupants: Vec<u64> = map.slots()[1..]
        .iter()
        .map(|slot| {
            let id = slot.occupant.unwrap();
            engine.state().chamber(id).unwrap().owner_id()
        })
        .collect();
    assert_eq!(occupants, members);
}

#[test]
fn test_no_two_registrations_share_a_location() {
    let mut engine = new_engine();
    let mut locations = std::collections::HashSet::new();

    for i in 0..40 {
        let member = add_member(&mut engine, i);
        let receipt = engine.enroll(member, None).unwrap();
        assert!(
            locations.insert(receipt.location),
            "location {} assigned twice",
            receipt.location
        );
    }
}
