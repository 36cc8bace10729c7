//! Participant model
//!
//! A participant is an account holder with a reward balance. Account
//! lifecycle (credentials, profile, activation) lives outside the core;
//! the engine only needs identity, balance, the referral guardian, and the
//! record of how the participant's first chamber was anchored.
//!
//! CRITICAL: balances are i64 fixed-point units (10_000 units = 1 KTA) and
//! are mutated only by applying ledger credits.

use serde::{Deserialize, Serialize};

/// Participant identifier, assigned in creation order
pub type ParticipantId = u64;

/// How the placement request that anchored a participant was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountingPolicy {
    /// Requested upline was honored as given
    Static,

    /// Requested upline was full or ineligible; earliest open anchor used
    Adjusted,

    /// No upline requested; earliest open anchor selected automatically
    Auto,
}

/// Record of the upline a participant was mounted beneath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mounting {
    /// Owner of the anchor chamber the participant landed under
    pub upline_id: ParticipantId,

    /// Whether the request was honored, adjusted, or automatic
    pub policy: MountingPolicy,
}

/// An account holder in the matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Creation-ordered identifier
    id: ParticipantId,

    /// Display address (`0x…`), unique; format enforced by the account
    /// collaborator, treated as opaque here
    address: String,

    /// Reward balance in fixed-point units
    balance: i64,

    /// Guardian who referred this participant, if one was named
    referrer: Option<ParticipantId>,

    /// How this participant's tier-1 chamber was anchored; `None` until a
    /// chamber has been placed (genesis owners keep `None`)
    mounting: Option<Mounting>,
}

impl Participant {
    /// Create a participant with a zero balance
    pub fn new(id: ParticipantId, address: String) -> Self {
        Self {
            id,
            address,
            balance: 0,
            referrer: None,
            mounting: None,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn referrer(&self) -> Option<ParticipantId> {
        self.referrer
    }

    pub fn mounting(&self) -> Option<Mounting> {
        self.mounting
    }

    /// Record the guardian named at registration; set at most once
    pub(crate) fn set_referrer(&mut self, guardian_id: ParticipantId) {
        debug_assert!(self.referrer.is_none(), "referrer is write-once");
        self.referrer = Some(guardian_id);
    }

    /// Record how the participant's first chamber was anchored
    pub(crate) fn set_mounting(&mut self, mounting: Mounting) {
        self.mounting = Some(mounting);
    }

    /// Apply an earnings credit to the balance
    ///
    /// # Panics
    /// Panics on a non-positive amount; the ledger only issues credits.
    pub(crate) fn credit(&mut self, amount: i64) {
        assert!(amount > 0, "credit amount must be positive");
        self.balance += amount;
    }

    /// Rebuild a participant from snapshot fields
    pub(crate) fn from_snapshot(
        id: ParticipantId,
        address: String,
        balance: i64,
        referrer: Option<ParticipantId>,
        mounting: Option<Mounting>,
    ) -> Self {
        Self {
            id,
            address,
            balance,
            referrer,
            mounting,
        }
    }
}
