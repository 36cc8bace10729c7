//! Placement allocator
//!
//! Finds the slot a new chamber goes into and creates it there.
//!
//! Anchor resolution, in order of preference:
//! 1. the caller-named upline's earliest open chamber at the tier
//! 2. the globally earliest-created open anchor at the tier (recorded as an
//!    adjustment when a named upline could not be honored)
//! 3. genesis: the tier root itself, when the tier has no open anchor at all
//!
//! Slot selection inside the resolved anchor's safe follows the fixed
//! enumeration order of [`crate::safemap`]; the first open descendant slot
//! wins. Concurrent callers serialize on the `&mut MatrixState` borrow, so
//! the read-scan-create sequence is atomic per call.

use crate::coords::Location;
use crate::models::{ChamberId, MatrixState, MountingPolicy, ParticipantId, UnlockOrigin};
use crate::safemap::build_safe_map;
use thiserror::Error;
use tracing::warn;

/// How a caller names the anchor it wants to place under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSelector {
    /// Place under this participant's earliest open chamber at the tier
    Upline(ParticipantId),

    /// Place under this specific chamber
    Chamber(ChamberId),
}

/// How the anchor was actually resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorResolution {
    /// The requested anchor was used as given
    Honored,

    /// The requested anchor was full or ineligible; the earliest open
    /// anchor was used instead
    Adjusted,

    /// No anchor was requested; the earliest open anchor was selected
    Auto,

    /// No open anchor existed; the chamber became the tier root
    Genesis,
}

impl AnchorResolution {
    /// Mounting policy to record on the participant, if any
    pub fn mounting_policy(&self) -> Option<MountingPolicy> {
        match self {
            AnchorResolution::Honored => Some(MountingPolicy::Static),
            AnchorResolution::Adjusted => Some(MountingPolicy::Adjusted),
            AnchorResolution::Auto => Some(MountingPolicy::Auto),
            AnchorResolution::Genesis => None,
        }
    }
}

/// Errors surfaced by placement
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    /// No open anchor at the tier and the tier root is already occupied
    #[error("No capacity at tier {tier}: no open anchor and the tier root is taken")]
    NoCapacity { tier: u8 },

    /// The caller-named anchor cannot be used and fallback is disabled
    #[error("Requested anchor at tier {tier} does not exist or is not open")]
    InvalidAnchor { tier: u8 },

    /// An anchor reported open had no vacant slot (integrity violation)
    #[error("Safe at {location} has no vacancy despite an open fill count")]
    CapacityExhausted { location: Location },

    /// Tier outside the configured range
    #[error("Tier {tier} is outside the supported range")]
    InvalidTier { tier: u8 },
}

/// Result of a successful placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementOutcome {
    /// The chamber that was created
    pub chamber_id: ChamberId,

    /// Where it was created
    pub location: Location,

    /// Tier it was created in
    pub tier: u8,

    /// How the anchor was resolved
    pub resolution: AnchorResolution,

    /// Owner of the anchor chamber the placement landed under
    /// (`None` for genesis placements)
    pub anchor_owner: Option<ParticipantId>,
}

/// Resolve an anchor, pick the first open slot beneath it, and create the
/// chamber there
///
/// Does not raise events; the engine enqueues `ChamberCreated` once this
/// returns, so the event can never precede the state mutation.
pub fn place_new_chamber(
    state: &mut MatrixState,
    owner_id: ParticipantId,
    anchor: Option<AnchorSelector>,
    tier: u8,
    origin: UnlockOrigin,
    fallback_on_full_upline: bool,
) -> Result<PlacementOutcome, PlacementError> {
    let resolved = resolve_anchor(state, anchor, tier, fallback_on_full_upline)?;

    let (anchor_id, resolution) = match resolved {
        Some(pair) => pair,
        None => return place_genesis(state, owner_id, tier, origin),
    };

    let anchor_chamber = state
        .chamber(anchor_id)
        .expect("resolved anchor id exists in the same borrow");
    let anchor_location = anchor_chamber.location();
    let anchor_owner = anchor_chamber.owner_id();

    let safe_map = build_safe_map(state, anchor_location);
    let slot = match safe_map.first_vacancy() {
        Some(slot) => *slot,
        None => {
            warn!(
                anchor = %anchor_location,
                fill_count = anchor_chamber.fill_count(),
                "assembled safe has no vacancy for an anchor reported open"
            );
            return Err(PlacementError::CapacityExhausted {
                location: anchor_location,
            });
        }
    };

    let chamber_id = state.create_chamber(tier, slot.location, owner_id, origin);
    Ok(PlacementOutcome {
        chamber_id,
        location: slot.location,
        tier,
        resolution,
        anchor_owner: Some(anchor_owner),
    })
}

/// Resolve the anchor to place under, or `None` for a genesis placement
fn resolve_anchor(
    state: &MatrixState,
    anchor: Option<AnchorSelector>,
    tier: u8,
    fallback_on_full_upline: bool,
) -> Result<Option<(ChamberId, AnchorResolution)>, PlacementError> {
    match anchor {
        Some(AnchorSelector::Upline(upline_id)) => {
            if let Some(chamber) = state.earliest_open_anchor_of(upline_id, tier) {
                return Ok(Some((chamber.id(), AnchorResolution::Honored)));
            }
            fall_back(state, tier, fallback_on_full_upline)
        }
        Some(AnchorSelector::Chamber(chamber_id)) => {
            match state.chamber(chamber_id) {
                Some(chamber) if chamber.tier() == tier && chamber.is_open_anchor() => {
                    Ok(Some((chamber.id(), AnchorResolution::Honored)))
                }
                _ => fall_back(state, tier, fallback_on_full_upline),
            }
        }
        None => Ok(state
            .earliest_open_anchor(tier)
            .map(|chamber| (chamber.id(), AnchorResolution::Auto))),
    }
}

/// Earliest-open fallback for a request whose named anchor cannot be used
fn fall_back(
    state: &MatrixState,
    tier: u8,
    fallback_on_full_upline: bool,
) -> Result<Option<(ChamberId, AnchorResolution)>, PlacementError> {
    if !fallback_on_full_upline {
        return Err(PlacementError::InvalidAnchor { tier });
    }
    Ok(state
        .earliest_open_anchor(tier)
        .map(|chamber| (chamber.id(), AnchorResolution::Adjusted)))
}

/// Create the tier root when a tier has no open anchor
fn place_genesis(
    state: &mut MatrixState,
    owner_id: ParticipantId,
    tier: u8,
    origin: UnlockOrigin,
) -> Result<PlacementOutcome, PlacementError> {
    let root = Location::tier_root(tier).map_err(|_| PlacementError::InvalidTier { tier })?;
    if state.chamber_at(root).is_some() {
        // Every chamber in the tier is full yet the root exists: the tier
        // has no room for new genesis trees.
        return Err(PlacementError::NoCapacity { tier });
    }

    let chamber_id = state.create_chamber(tier, root, owner_id, origin);
    Ok(PlacementOutcome {
        chamber_id,
        location: root,
        tier,
        resolution: AnchorResolution::Genesis,
        anchor_owner: None,
    })
}
