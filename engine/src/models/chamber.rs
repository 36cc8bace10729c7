//! Chamber model
//!
//! A chamber is one occupied position in the matrix. Its "safe" is the
//! depth-2 sub-tree it anchors: the chamber itself, its 2 direct descendant
//! slots, and their 4 descendants: 7 positions in total.
//!
//! # Critical Invariants
//!
//! 1. `location` and `id` are immutable once the chamber is created
//! 2. `fill_count` starts at 1 (the chamber sees itself), never decreases,
//!    and never exceeds [`SAFE_CAPACITY`]
//! 3. Only the cascade increments `fill_count`; reaching capacity marks the
//!    safe complete, and the chamber is never deleted afterwards

use crate::coords::Location;
use serde::{Deserialize, Serialize};

/// Number of positions in a chamber's safe (itself + 6 descendant slots)
pub const SAFE_CAPACITY: u8 = 7;

/// Chamber identifier, assigned in creation order
///
/// The earliest-anchor-first placement policy ties on this id, so ids must
/// be monotone in creation order. [`MatrixState`](crate::models::MatrixState)
/// issues them from a sequence.
pub type ChamberId = u64;

/// How a chamber came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockOrigin {
    /// Created for a participant's own registration
    SelfRegistration,

    /// Created by redeeming a prepaid voucher
    VoucherRedemption,

    /// Created by a completed safe advancing its owner one tier up
    TierAdvancement,
}

impl UnlockOrigin {
    /// Whether chambers of this origin may be auto-selected as anchors
    ///
    /// Voucher chambers occupy slots and cascade like any other, but the
    /// earliest-open anchor scan skips them.
    pub fn is_placement_eligible(&self) -> bool {
        !matches!(self, UnlockOrigin::VoucherRedemption)
    }

    /// Short code used in logs and serialized snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockOrigin::SelfRegistration => "self_registration",
            UnlockOrigin::VoucherRedemption => "voucher_redemption",
            UnlockOrigin::TierAdvancement => "tier_advancement",
        }
    }
}

/// One occupied position in the matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chamber {
    /// Creation-ordered identifier
    id: ChamberId,

    /// Tier this chamber's tree belongs to (1..=7)
    tier: u8,

    /// Position within the tier's tree; globally unique
    location: Location,

    /// Participant holding this chamber; never reassigned
    owner_id: u64,

    /// Occupied positions in this chamber's safe, itself included (1..=7)
    fill_count: u8,

    /// How the chamber was unlocked
    origin: UnlockOrigin,
}

impl Chamber {
    /// Create a chamber at a location
    ///
    /// # Panics
    /// Panics if the location's tier disagrees with `tier`; the caller
    /// derives both from the same placement and they can never diverge.
    pub fn new(id: ChamberId, tier: u8, location: Location, owner_id: u64, origin: UnlockOrigin) -> Self {
        assert_eq!(location.tier(), tier, "location tier must match chamber tier");
        Self {
            id,
            tier,
            location,
            owner_id,
            fill_count: 1,
            origin,
        }
    }

    pub fn id(&self) -> ChamberId {
        self.id
    }

    pub fn tier(&self) -> u8 {
        self.tier
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn owner_id(&self) -> u64 {
        self.owner_id
    }

    pub fn fill_count(&self) -> u8 {
        self.fill_count
    }

    pub fn origin(&self) -> UnlockOrigin {
        self.origin
    }

    /// Whether this chamber's safe has reached capacity
    pub fn is_complete(&self) -> bool {
        self.fill_count >= SAFE_CAPACITY
    }

    /// Whether the earliest-open anchor scan may select this chamber
    pub fn is_open_anchor(&self) -> bool {
        self.origin.is_placement_eligible() && !self.is_complete()
    }

    /// Record one newly occupied position in this chamber's safe
    ///
    /// Returns the new fill count. Called only by the cascade, via
    /// [`MatrixState::record_fill`](crate::models::MatrixState::record_fill).
    ///
    /// # Panics
    /// Panics if the safe is already at capacity. The cascade stops
    /// incrementing a chamber once its completion has fired, so an
    /// overflow here means a corrupted counter.
    pub(crate) fn record_fill(&mut self) -> u8 {
        assert!(
            self.fill_count < SAFE_CAPACITY,
            "fill_count overflow at {}: safe already complete",
            self.location
        );
        self.fill_count += 1;
        self.fill_count
    }

    /// Rebuild a chamber from snapshot fields
    pub(crate) fn from_snapshot(
        id: ChamberId,
        tier: u8,
        location: Location,
        owner_id: u64,
        fill_count: u8,
        origin: UnlockOrigin,
    ) -> Self {
        assert!(
            (1..=SAFE_CAPACITY).contains(&fill_count),
            "snapshot fill_count out of range: {}",
            fill_count
        );
        Self {
            id,
            tier,
            location,
            owner_id,
            fill_count,
            origin,
        }
    }
}
