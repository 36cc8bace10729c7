//! Open-anchor index
//!
//! Provides O(log n) selection of the earliest open anchor per tier.
//!
//! # Problem
//!
//! Every placement without an explicit anchor needs "the earliest-created,
//! not-yet-full, placement-eligible chamber at tier T". A table scan ordered
//! by id costs O(chambers) per placement and repeats on every registration.
//!
//! # Solution
//!
//! Keep a `BTreeSet<ChamberId>` of open anchors per tier, updated
//! incrementally: insert when an eligible chamber is created, remove when
//! its safe completes. Chamber ids are creation-ordered, so the set minimum
//! is exactly the earliest-first scan result.

use crate::models::chamber::{Chamber, ChamberId};
use std::collections::{BTreeSet, HashMap};

/// Per-tier index of chambers whose safes can still accept placements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorIndex {
    /// Tier → ids of open, placement-eligible chambers
    open_by_tier: HashMap<u8, BTreeSet<ChamberId>>,
}

impl AnchorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly created chamber if it can serve as an anchor
    pub fn insert(&mut self, chamber: &Chamber) {
        if chamber.is_open_anchor() {
            self.open_by_tier
                .entry(chamber.tier())
                .or_default()
                .insert(chamber.id());
        }
    }

    /// Drop a chamber whose safe has completed
    pub fn remove(&mut self, tier: u8, id: ChamberId) {
        if let Some(open) = self.open_by_tier.get_mut(&tier) {
            open.remove(&id);
            if open.is_empty() {
                self.open_by_tier.remove(&tier);
            }
        }
    }

    /// Earliest-created open anchor at a tier, if any
    pub fn earliest_open(&self, tier: u8) -> Option<ChamberId> {
        self.open_by_tier
            .get(&tier)
            .and_then(|open| open.iter().next().copied())
    }

    /// Number of open anchors at a tier
    pub fn open_count(&self, tier: u8) -> usize {
        self.open_by_tier.get(&tier).map_or(0, |open| open.len())
    }

    /// Rebuild from a full chamber scan
    ///
    /// Used by snapshot restore and by the integrity validator, which
    /// compares the incremental index against this ground truth.
    pub fn rebuild<'a>(chambers: impl Iterator<Item = &'a Chamber>) -> Self {
        let mut index = Self::new();
        for chamber in chambers {
            index.insert(chamber);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Location;
    use crate::models::chamber::UnlockOrigin;

    fn chamber(id: ChamberId, location: &str, origin: UnlockOrigin) -> Chamber {
        let location: Location = location.parse().unwrap();
        Chamber::new(id, location.tier(), location, 10, origin)
    }

    #[test]
    fn test_earliest_open_prefers_lowest_id() {
        let mut index = AnchorIndex::new();
        index.insert(&chamber(5, "1.2.1", UnlockOrigin::SelfRegistration));
        index.insert(&chamber(3, "1.1.1", UnlockOrigin::SelfRegistration));
        index.insert(&chamber(9, "1.2.2", UnlockOrigin::SelfRegistration));

        assert_eq!(index.earliest_open(1), Some(3));
        assert_eq!(index.open_count(1), 3);
    }

    #[test]
    fn test_tiers_are_independent() {
        let mut index = AnchorIndex::new();
        index.insert(&chamber(1, "1.1.1", UnlockOrigin::SelfRegistration));
        index.insert(&chamber(2, "2.1.1", UnlockOrigin::TierAdvancement));

        assert_eq!(index.earliest_open(1), Some(1));
        assert_eq!(index.earliest_open(2), Some(2));
        assert_eq!(index.earliest_open(3), None);
    }

    #[test]
    fn test_voucher_chambers_are_skipped() {
        let mut index = AnchorIndex::new();
        index.insert(&chamber(1, "1.1.1", UnlockOrigin::VoucherRedemption));

        assert_eq!(index.earliest_open(1), None);
    }

    #[test]
    fn test_remove_uncovers_next_earliest() {
        let mut index = AnchorIndex::new();
        index.insert(&chamber(1, "1.1.1", UnlockOrigin::SelfRegistration));
        index.insert(&chamber(2, "1.2.1", UnlockOrigin::SelfRegistration));

        index.remove(1, 1);
        assert_eq!(index.earliest_open(1), Some(2));

        index.remove(1, 2);
        assert_eq!(index.earliest_open(1), None);
        assert_eq!(index.open_count(1), 0);
    }

    #[test]
    fn test_rebuild_matches_incremental_updates() {
        let chambers = vec![
            chamber(1, "1.1.1", UnlockOrigin::SelfRegistration),
            chamber(2, "1.2.1", UnlockOrigin::VoucherRedemption),
            chamber(3, "2.1.1", UnlockOrigin::TierAdvancement),
        ];

        let mut incremental = AnchorIndex::new();
        for chamber in &chambers {
            incremental.insert(chamber);
        }
        let rebuilt = AnchorIndex::rebuild(chambers.iter());

        assert_eq!(incremental, rebuilt);
    }
}
