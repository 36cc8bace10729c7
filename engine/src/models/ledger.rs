//! Earnings ledger
//!
//! Append-only record of every credit the matrix pays out. Balances are
//! derived state: a participant's balance must always equal the sum of
//! their ledger credits, which the checkpoint validator enforces.
//!
//! Two kinds of credit exist:
//! - `Safe`: paid to a chamber's owner when its safe completes, referencing
//!   the completed chamber
//! - `Ref1`/`Ref2`/`Ref3`: paid to the guardian chain at registration,
//!   referencing the depth-1 referral record

use crate::models::chamber::ChamberId;
use crate::models::participant::ParticipantId;
use serde::{Deserialize, Serialize};

/// Fixed-point scale: 10_000 units = 1 KTA
pub const UNITS_PER_KTA: i64 = 10_000;

/// What a ledger credit was paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningCode {
    /// Safe completion payout
    Safe,

    /// Direct referral
    Ref1,

    /// Referral at depth 2 (guardian's guardian)
    Ref2,

    /// Referral at depth 3
    Ref3,
}

impl EarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningCode::Safe => "safe",
            EarningCode::Ref1 => "ref_1",
            EarningCode::Ref2 => "ref_2",
            EarningCode::Ref3 => "ref_3",
        }
    }

    /// The referral code for a guardian-chain depth (1..=3)
    pub fn for_referral_depth(depth: u8) -> Option<EarningCode> {
        match depth {
            1 => Some(EarningCode::Ref1),
            2 => Some(EarningCode::Ref2),
            3 => Some(EarningCode::Ref3),
            _ => None,
        }
    }
}

/// Entity a ledger credit points back at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerRef {
    /// The chamber whose safe completion produced the credit
    Chamber(ChamberId),

    /// The depth-1 referral record of the registration that produced it
    Referral(u64),
}

/// One immutable earnings credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonic sequence number within the ledger
    seq: u64,

    /// Participant the credit was paid to
    owner_id: ParticipantId,

    /// What the credit was paid for
    code: EarningCode,

    /// Tier the earning originated from (referrals are always tier 1)
    tier: u8,

    /// Amount in fixed-point units
    amount: i64,

    /// Entity the credit references
    reference: LedgerRef,
}

impl LedgerEntry {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn owner_id(&self) -> ParticipantId {
        self.owner_id
    }

    pub fn code(&self) -> EarningCode {
        self.code
    }

    pub fn tier(&self) -> u8 {
        self.tier
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn reference(&self) -> LedgerRef {
        self.reference
    }
}

/// Append-only credit ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a credit and return it
    ///
    /// # Panics
    /// Panics on a non-positive amount.
    pub(crate) fn append(
        &mut self,
        owner_id: ParticipantId,
        code: EarningCode,
        tier: u8,
        amount: i64,
        reference: LedgerRef,
    ) -> &LedgerEntry {
        assert!(amount > 0, "ledger credits must be positive");
        let seq = self.entries.len() as u64 + 1;
        self.entries.push(LedgerEntry {
            seq,
            owner_id,
            code,
            tier,
            amount,
            reference,
        });
        self.entries.last().unwrap()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// All credits paid to one participant
    pub fn entries_for(&self, owner_id: ParticipantId) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .collect()
    }

    /// All credits with a given code
    pub fn entries_of_code(&self, code: EarningCode) -> Vec<&LedgerEntry> {
        self.entries.iter().filter(|entry| entry.code == code).collect()
    }

    /// Sum of all credits paid to one participant
    pub fn total_credited(&self, owner_id: ParticipantId) -> i64 {
        self.entries
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.amount)
            .sum()
    }

    /// Credits referencing a chamber (exactly one for a completed safe)
    pub fn credits_for_chamber(&self, chamber_id: ChamberId) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.reference == LedgerRef::Chamber(chamber_id))
            .collect()
    }
}
