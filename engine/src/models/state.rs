//! Matrix state
//!
//! The complete persisted state of the matrix: every chamber, participant,
//! ledger credit, referral record, and voucher, plus the open-anchor index
//! derived from them.
//!
//! # Critical Invariants
//!
//! 1. **Location uniqueness**: at most one chamber per location
//! 2. **Creation order**: chamber, participant, referral, and voucher ids
//!    are issued from monotone sequences; earliest-first policies tie on id
//! 3. **Fill discipline**: `fill_count` changes only through
//!    [`MatrixState::record_fill`], which also maintains the anchor index
//! 4. **Balance = ledger**: participant balances change only through
//!    [`MatrixState::credit_owner`], so a balance always equals the sum of
//!    the owner's ledger credits

use crate::coords::Location;
use crate::models::anchor_index::AnchorIndex;
use crate::models::chamber::{Chamber, ChamberId, UnlockOrigin};
use crate::models::ledger::{EarningCode, Ledger, LedgerRef};
use crate::models::participant::{Participant, ParticipantId};
use crate::models::referral::Referral;
use crate::models::voucher::Voucher;
use std::collections::{BTreeMap, HashMap};

/// Complete matrix state
///
/// # Example
///
/// ```rust
/// use khazon_matrix_core_rs::models::MatrixState;
///
/// let mut state = MatrixState::new();
/// let owner = state.create_participant("0xaaa".to_string());
/// let location = "1.1.1".parse().unwrap();
/// state.create_chamber(1, location, owner, khazon_matrix_core_rs::models::UnlockOrigin::SelfRegistration);
/// assert_eq!(state.num_chambers(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixState {
    /// All chambers, keyed and iterated in creation order
    chambers: BTreeMap<ChamberId, Chamber>,

    /// Location → chamber id (location uniqueness lives here)
    by_location: HashMap<Location, ChamberId>,

    /// Owner → chamber ids in creation order
    by_owner: HashMap<ParticipantId, Vec<ChamberId>>,

    /// Open placement-eligible chambers per tier
    anchor_index: AnchorIndex,

    /// All participants, keyed in creation order
    participants: BTreeMap<ParticipantId, Participant>,

    /// Address → participant id
    by_address: HashMap<String, ParticipantId>,

    /// Append-only earnings ledger
    ledger: Ledger,

    /// Referral records in creation order
    referrals: Vec<Referral>,

    /// Vouchers keyed in creation order
    vouchers: BTreeMap<u64, Voucher>,

    /// Voucher code hash → voucher id
    voucher_by_hash: HashMap<String, u64>,

    next_chamber_id: ChamberId,
    next_participant_id: ParticipantId,
    next_voucher_id: u64,
}

impl MatrixState {
    pub fn new() -> Self {
        Self {
            chambers: BTreeMap::new(),
            by_location: HashMap::new(),
            by_owner: HashMap::new(),
            anchor_index: AnchorIndex::new(),
            participants: BTreeMap::new(),
            by_address: HashMap::new(),
            ledger: Ledger::new(),
            referrals: Vec::new(),
            vouchers: BTreeMap::new(),
            voucher_by_hash: HashMap::new(),
            next_chamber_id: 1,
            next_participant_id: 1,
            next_voucher_id: 1,
        }
    }

    // ========================================================================
    // Participants
    // ========================================================================

    /// Create a participant with a unique address
    ///
    /// # Panics
    /// Panics if the address is already registered; the engine checks
    /// availability before calling.
    pub fn create_participant(&mut self, address: String) -> ParticipantId {
        assert!(
            !self.by_address.contains_key(&address),
            "participant address {} already exists",
            address
        );
        let id = self.next_participant_id;
        self.next_participant_id += 1;
        self.by_address.insert(address.clone(), id);
        self.participants.insert(id, Participant::new(id, address));
        id
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub(crate) fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    pub fn participant_by_address(&self, address: &str) -> Option<&Participant> {
        self.by_address
            .get(address)
            .and_then(|id| self.participants.get(id))
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn num_participants(&self) -> usize {
        self.participants.len()
    }

    /// Sum of all participant balances (for invariant checks)
    pub fn total_balance(&self) -> i64 {
        self.participants.values().map(|p| p.balance()).sum()
    }

    // ========================================================================
    // Chambers
    // ========================================================================

    /// Create a chamber at a vacant location
    ///
    /// Assigns the next creation-ordered id, indexes the location and owner,
    /// and registers the chamber with the anchor index.
    ///
    /// # Panics
    /// Panics if the location is occupied. The placement path checks
    /// vacancy inside the same exclusive borrow, so a collision here means
    /// the slot scan was bypassed.
    pub fn create_chamber(
        &mut self,
        tier: u8,
        location: Location,
        owner_id: ParticipantId,
        origin: UnlockOrigin,
    ) -> ChamberId {
        assert!(
            !self.by_location.contains_key(&location),
            "location {} already occupied",
            location
        );
        let id = self.next_chamber_id;
        self.next_chamber_id += 1;

        let chamber = Chamber::new(id, tier, location, owner_id, origin);
        self.anchor_index.insert(&chamber);
        self.by_location.insert(location, id);
        self.by_owner.entry(owner_id).or_default().push(id);
        self.chambers.insert(id, chamber);
        id
    }

    pub fn chamber(&self, id: ChamberId) -> Option<&Chamber> {
        self.chambers.get(&id)
    }

    pub fn chamber_at(&self, location: Location) -> Option<&Chamber> {
        self.by_location.get(&location).and_then(|id| self.chambers.get(id))
    }

    /// All chambers in creation order
    pub fn chambers(&self) -> impl Iterator<Item = &Chamber> {
        self.chambers.values()
    }

    /// One owner's chambers in creation order
    pub fn chambers_of(&self, owner_id: ParticipantId) -> Vec<&Chamber> {
        self.by_owner
            .get(&owner_id)
            .map(|ids| ids.iter().filter_map(|id| self.chambers.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn num_chambers(&self) -> usize {
        self.chambers.len()
    }

    /// Record one newly occupied position in a chamber's safe
    ///
    /// The single mutation path for `fill_count`. Drops the chamber from
    /// the anchor index the moment it completes. Returns the new count.
    ///
    /// # Panics
    /// Panics if the chamber does not exist or its safe is already full.
    pub(crate) fn record_fill(&mut self, id: ChamberId) -> u8 {
        let chamber = self
            .chambers
            .get_mut(&id)
            .unwrap_or_else(|| panic!("record_fill on unknown chamber {}", id));
        let fill = chamber.record_fill();
        if chamber.is_complete() {
            let tier = chamber.tier();
            self.anchor_index.remove(tier, id);
        }
        fill
    }

    // ========================================================================
    // Anchor selection
    // ========================================================================

    /// Earliest-created open anchor at a tier
    pub fn earliest_open_anchor(&self, tier: u8) -> Option<&Chamber> {
        self.anchor_index
            .earliest_open(tier)
            .and_then(|id| self.chambers.get(&id))
    }

    /// Earliest open anchor at a tier among one owner's chambers
    ///
    /// Owners hold at most a handful of chambers, so this scans the owner's
    /// creation-ordered list directly.
    pub fn earliest_open_anchor_of(&self, owner_id: ParticipantId, tier: u8) -> Option<&Chamber> {
        self.chambers_of(owner_id)
            .into_iter()
            .find(|chamber| chamber.tier() == tier && chamber.is_open_anchor())
    }

    pub fn anchor_index(&self) -> &AnchorIndex {
        &self.anchor_index
    }

    // ========================================================================
    // Earnings
    // ========================================================================

    /// Append a ledger credit and apply it to the owner's balance
    ///
    /// The credit entry and the balance update are one unit: both happen
    /// here or the call panics before touching either.
    ///
    /// # Panics
    /// Panics if the owner does not exist or the amount is not positive.
    pub(crate) fn credit_owner(
        &mut self,
        owner_id: ParticipantId,
        code: EarningCode,
        tier: u8,
        amount: i64,
        reference: LedgerRef,
    ) -> u64 {
        assert!(
            self.participants.contains_key(&owner_id),
            "credit to unknown participant {}",
            owner_id
        );
        let seq = self.ledger.append(owner_id, code, tier, amount, reference).seq();
        self.participants
            .get_mut(&owner_id)
            .expect("participant checked above")
            .credit(amount);
        seq
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    // ========================================================================
    // Referrals
    // ========================================================================

    /// Append a referral record, returning its id
    pub(crate) fn create_referral(
        &mut self,
        guardian_id: ParticipantId,
        registrant_id: ParticipantId,
        depth: u8,
    ) -> u64 {
        let id = self.referrals.len() as u64 + 1;
        self.referrals.push(Referral::new(id, guardian_id, registrant_id, depth));
        id
    }

    pub fn referrals(&self) -> &[Referral] {
        &self.referrals
    }

    // ========================================================================
    // Vouchers
    // ========================================================================

    /// Store a voucher by its code digest, returning its id
    pub(crate) fn create_voucher(&mut self, code_hash: String) -> u64 {
        assert!(
            !self.voucher_by_hash.contains_key(&code_hash),
            "voucher hash collision"
        );
        let id = self.next_voucher_id;
        self.next_voucher_id += 1;
        self.voucher_by_hash.insert(code_hash.clone(), id);
        self.vouchers.insert(id, Voucher::new(id, code_hash));
        id
    }

    pub fn voucher_by_hash(&self, code_hash: &str) -> Option<&Voucher> {
        self.voucher_by_hash
            .get(code_hash)
            .and_then(|id| self.vouchers.get(id))
    }

    pub(crate) fn voucher_by_hash_mut(&mut self, code_hash: &str) -> Option<&mut Voucher> {
        let id = *self.voucher_by_hash.get(code_hash)?;
        self.vouchers.get_mut(&id)
    }

    pub fn vouchers(&self) -> impl Iterator<Item = &Voucher> {
        self.vouchers.values()
    }

    // ========================================================================
    // Snapshot support
    // ========================================================================

    /// Rebuild a state from snapshot rows
    ///
    /// Derived structures (location/owner/address maps, the anchor index,
    /// id sequences) are reconstructed from the rows themselves.
    pub(crate) fn from_snapshot_rows(
        chambers: Vec<Chamber>,
        participants: Vec<Participant>,
        ledger: Ledger,
        referrals: Vec<Referral>,
        vouchers: Vec<Voucher>,
    ) -> Self {
        let mut state = MatrixState::new();

        for participant in participants {
            state.next_participant_id = state.next_participant_id.max(participant.id() + 1);
            state
                .by_address
                .insert(participant.address().to_string(), participant.id());
            state.participants.insert(participant.id(), participant);
        }
        for chamber in chambers {
            state.next_chamber_id = state.next_chamber_id.max(chamber.id() + 1);
            state.anchor_index.insert(&chamber);
            state.by_location.insert(chamber.location(), chamber.id());
            state.by_owner.entry(chamber.owner_id()).or_default().push(chamber.id());
            state.chambers.insert(chamber.id(), chamber);
        }
        for voucher in vouchers {
            state.next_voucher_id = state.next_voucher_id.max(voucher.id() + 1);
            state
                .voucher_by_hash
                .insert(voucher.code_hash().to_string(), voucher.id());
            state.vouchers.insert(voucher.id(), voucher);
        }
        state.ledger = ledger;
        state.referrals = referrals;
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_genesis() -> (MatrixState, ParticipantId, ChamberId) {
        let mut state = MatrixState::new();
        let owner = state.create_participant("0xaaa".to_string());
        let root = Location::tier_root(1).unwrap();
        let chamber_id = state.create_chamber(1, root, owner, UnlockOrigin::SelfRegistration);
        (state, owner, chamber_id)
    }

    #[test]
    fn test_create_chamber_indexes_location_and_owner() {
        let (state, owner, chamber_id) = state_with_genesis();

        let root = Location::tier_root(1).unwrap();
        assert_eq!(state.chamber_at(root).unwrap().id(), chamber_id);
        assert_eq!(state.chambers_of(owner).len(), 1);
        assert_eq!(state.earliest_open_anchor(1).unwrap().id(), chamber_id);
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn test_duplicate_location_panics() {
        let (mut state, owner, _) = state_with_genesis();
        let root = Location::tier_root(1).unwrap();
        state.create_chamber(1, root, owner, UnlockOrigin::SelfRegistration);
    }

    #[test]
    fn test_record_fill_retires_full_anchor() {
        let (mut state, _, chamber_id) = state_with_genesis();

        for _ in 0..5 {
            state.record_fill(chamber_id);
        }
        assert_eq!(state.earliest_open_anchor(1).unwrap().id(), chamber_id);

        state.record_fill(chamber_id);
        assert!(state.chamber(chamber_id).unwrap().is_complete());
        assert_eq!(state.earliest_open_anchor(1), None);
    }

    #[test]
    fn test_credit_owner_updates_ledger_and_balance_together() {
        let (mut state, owner, chamber_id) = state_with_genesis();

        let seq = state.credit_owner(owner, EarningCode::Safe, 1, 50_000, LedgerRef::Chamber(chamber_id));

        assert_eq!(seq, 1);
        assert_eq!(state.participant(owner).unwrap().balance(), 50_000);
        assert_eq!(state.ledger().total_credited(owner), 50_000);
    }

    #[test]
    fn test_earliest_open_anchor_of_scopes_to_owner_and_tier() {
        let (mut state, owner, chamber_id) = state_with_genesis();
        let other = state.create_participant("0xbbb".to_string());
        let left = Location::tier_root(1).unwrap().left_child();
        state.create_chamber(1, left, other, UnlockOrigin::SelfRegistration);

        assert_eq!(state.earliest_open_anchor_of(owner, 1).unwrap().id(), chamber_id);
        assert_eq!(state.earliest_open_anchor_of(owner, 2), None);
    }

    #[test]
    fn test_from_snapshot_rows_restores_derived_maps() {
        let (state, owner, chamber_id) = state_with_genesis();

        let restored = MatrixState::from_snapshot_rows(
            state.chambers().cloned().collect(),
            state.participants().cloned().collect(),
            state.ledger().clone(),
            state.referrals().to_vec(),
            state.vouchers().cloned().collect(),
        );

        assert_eq!(restored, state);
        assert_eq!(restored.chambers_of(owner).len(), 1);
        assert_eq!(restored.earliest_open_anchor(1).unwrap().id(), chamber_id);
    }
}
