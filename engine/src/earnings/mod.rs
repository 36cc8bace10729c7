//! Earnings application
//!
//! Two earning flows feed the ledger:
//!
//! - **Safe completion**: one credit per completed safe, amount looked up
//!   from the per-tier schedule, paid to the completed chamber's owner.
//! - **Referral**: paid at registration to the guardian chain (depths
//!   1..=3) when an upline was explicitly named.
//!
//! Every credit goes through [`MatrixState::credit_owner`], which writes
//! the ledger entry and the balance update as one unit.
//!
//! CRITICAL: amounts are i64 fixed-point units (10_000 units = 1 KTA).

use crate::models::referral::MAX_REFERRAL_DEPTH;
use crate::models::{ChamberId, EarningCode, LedgerRef, MatrixState, ParticipantId};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Per-tier safe-completion payout table
///
/// Index 0 pays tier 1. Tiers past the end of the table pay nothing;
/// completions there still fire, they just produce no credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSchedule {
    amounts: Vec<i64>,
}

impl EarningsSchedule {
    pub fn new(amounts: Vec<i64>) -> Self {
        Self { amounts }
    }

    /// Payout for completing a safe at `tier`, if the tier is scheduled
    pub fn amount_for(&self, tier: u8) -> Option<i64> {
        if tier == 0 {
            return None;
        }
        self.amounts.get(tier as usize - 1).copied()
    }

    /// Number of tiers the schedule covers
    pub fn tiers(&self) -> u8 {
        self.amounts.len() as u8
    }

    pub fn amounts(&self) -> &[i64] {
        &self.amounts
    }
}

impl Default for EarningsSchedule {
    /// Doubling payout ladder: 5 KTA at tier 1 up to 320 KTA at tier 7
    fn default() -> Self {
        Self {
            amounts: vec![
                50_000, 100_000, 200_000, 400_000, 800_000, 1_600_000, 3_200_000,
            ],
        }
    }
}

/// Apply the safe-completion payout for a completed chamber
///
/// Returns the ledger sequence of the credit, or `None` when the tier is
/// not scheduled to pay.
pub fn apply_safe_completion(
    state: &mut MatrixState,
    schedule: &EarningsSchedule,
    chamber_id: ChamberId,
    owner_id: ParticipantId,
    tier: u8,
) -> Option<u64> {
    let amount = schedule.amount_for(tier)?;
    let seq = state.credit_owner(owner_id, EarningCode::Safe, tier, amount, LedgerRef::Chamber(chamber_id));
    info!(owner_id, tier, amount, seq, "safe completion credited");
    Some(seq)
}

/// Per-depth referral payout amounts (depth 1 first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEarnings {
    amounts: [i64; MAX_REFERRAL_DEPTH as usize],
}

impl ReferralEarnings {
    pub fn new(amounts: [i64; MAX_REFERRAL_DEPTH as usize]) -> Self {
        Self { amounts }
    }

    pub fn amount_for(&self, depth: u8) -> Option<i64> {
        if depth == 0 {
            return None;
        }
        self.amounts.get(depth as usize - 1).copied()
    }
}

impl Default for ReferralEarnings {
    /// 1 KTA direct, halving per depth
    fn default() -> Self {
        Self {
            amounts: [10_000, 5_000, 2_500],
        }
    }
}

/// Record the guardian chain of a registration and pay each level
///
/// Walks `guardian_id`'s own referrer chain up to [`MAX_REFERRAL_DEPTH`]
/// levels, writing one referral record per level present and crediting each
/// guardian. All referral credits reference the depth-1 record. Returns the
/// guardian ids paid, outermost first.
pub fn apply_referral_chain(
    state: &mut MatrixState,
    earnings: &ReferralEarnings,
    guardian_id: ParticipantId,
    registrant_id: ParticipantId,
) -> Vec<ParticipantId> {
    let mut paid = Vec::new();
    let mut current = Some(guardian_id);
    let mut direct_referral_id = None;

    for depth in 1..=MAX_REFERRAL_DEPTH {
        let Some(guardian) = current else { break };

        let referral_id = state.create_referral(guardian, registrant_id, depth);
        if depth == 1 {
            direct_referral_id = Some(referral_id);
        }
        let reference = LedgerRef::Referral(direct_referral_id.expect("depth 1 recorded first"));

        let code = EarningCode::for_referral_depth(depth).expect("depth bounded by MAX_REFERRAL_DEPTH");
        if let Some(amount) = earnings.amount_for(depth) {
            state.credit_owner(guardian, code, 1, amount, reference);
        }
        paid.push(guardian);

        current = state.participant(guardian).and_then(|p| p.referrer());
    }
    paid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Location;
    use crate::models::UnlockOrigin;

    #[test]
    fn test_schedule_lookup_by_tier() {
        let schedule = EarningsSchedule::default();
        assert_eq!(schedule.amount_for(1), Some(50_000));
        assert_eq!(schedule.amount_for(7), Some(3_200_000));
        assert_eq!(schedule.amount_for(0), None);
        assert_eq!(schedule.amount_for(8), None);
    }

    #[test]
    fn test_short_schedule_leaves_top_tier_unpaid() {
        // A six-entry table reproduces a ladder where the top tier fires
        // without paying.
        let schedule = EarningsSchedule::new(vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(schedule.amount_for(6), Some(6));
        assert_eq!(schedule.amount_for(7), None);
    }

    #[test]
    fn test_apply_safe_completion_writes_one_credit() {
        let mut state = MatrixState::new();
        let owner = state.create_participant("0xaaa".to_string());
        let root = Location::tier_root(2).unwrap();
        let chamber_id = state.create_chamber(2, root, owner, UnlockOrigin::TierAdvancement);

        let schedule = EarningsSchedule::default();
        let seq = apply_safe_completion(&mut state, &schedule, chamber_id, owner, 2);

        assert_eq!(seq, Some(1));
        assert_eq!(state.participant(owner).unwrap().balance(), 100_000);
        assert_eq!(state.ledger().credits_for_chamber(chamber_id).len(), 1);
    }

    #[test]
    fn test_referral_chain_pays_three_depths() {
        let mut state = MatrixState::new();
        let root_guardian = state.create_participant("0xaaa".to_string());
        let mid = state.create_participant("0xbbb".to_string());
        let direct = state.create_participant("0xccc".to_string());
        let registrant = state.create_participant("0xddd".to_string());
        state.participant_mut(mid).unwrap().set_referrer(root_guardian);
        state.participant_mut(direct).unwrap().set_referrer(mid);

        let earnings = ReferralEarnings::default();
        let paid = apply_referral_chain(&mut state, &earnings, direct, registrant);

        assert_eq!(paid, vec![direct, mid, root_guardian]);
        assert_eq!(state.participant(direct).unwrap().balance(), 10_000);
        assert_eq!(state.participant(mid).unwrap().balance(), 5_000);
        assert_eq!(state.participant(root_guardian).unwrap().balance(), 2_500);
        assert_eq!(state.referrals().len(), 3);

        // Every credit points at the depth-1 referral record.
        let depth_1_id = state.referrals()[0].id();
        for entry in state.ledger().entries() {
            assert_eq!(entry.reference(), LedgerRef::Referral(depth_1_id));
        }
    }

    #[test]
    fn test_referral_chain_stops_where_referrers_end() {
        let mut state = MatrixState::new();
        let direct = state.create_participant("0xaaa".to_string());
        let registrant = state.create_participant("0xbbb".to_string());

        let earnings = ReferralEarnings::default();
        let paid = apply_referral_chain(&mut state, &earnings, direct, registrant);

        assert_eq!(paid, vec![direct]);
        assert_eq!(state.referrals().len(), 1);
        assert_eq!(state.ledger().len(), 1);
    }
}
