//! Checkpoint: save/load matrix state
//!
//! Serializes the complete matrix (chambers, participants, ledger,
//! referrals, vouchers, audit log) for backup, migration, and integrity
//! audits.
//!
//! # Critical Invariants
//!
//! - **Fidelity**: capture → restore reproduces the engine state exactly,
//!   derived indexes included
//! - **Determinism**: the state digest canonicalizes JSON key order, so
//!   equal states always hash equal
//! - **Validation**: a snapshot is checked against the structural and
//!   ledger invariants before it is allowed to become live state

use crate::coords::Location;
use crate::engine::{EngineError, MatrixConfig, MatrixEngine};
use crate::events::EventLog;
use crate::models::{
    AnchorIndex, Chamber, ChamberId, EarningCode, Ledger, LedgerRef, MatrixState, Mounting,
    Participant, ParticipantId, Referral, UnlockOrigin, Voucher, SAFE_CAPACITY,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors produced while capturing, hashing, or validating snapshots
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("State validation error: {0}")]
    Validation(String),
}

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete engine state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSnapshot {
    /// All chambers in creation order
    pub chambers: Vec<ChamberSnapshot>,

    /// All participants in creation order
    pub participants: Vec<ParticipantSnapshot>,

    /// The full earnings ledger
    pub ledger: Ledger,

    /// Referral records in creation order
    pub referrals: Vec<Referral>,

    /// Vouchers in creation order
    pub vouchers: Vec<Voucher>,

    /// Audit log of every dispatched event
    pub audit_log: EventLog,
}

/// Chamber state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamberSnapshot {
    pub id: ChamberId,
    pub tier: u8,
    pub location: Location,
    pub owner_id: ParticipantId,
    pub fill_count: u8,
    pub origin: UnlockOrigin,
}

impl From<&Chamber> for ChamberSnapshot {
    fn from(chamber: &Chamber) -> Self {
        ChamberSnapshot {
            id: chamber.id(),
            tier: chamber.tier(),
            location: chamber.location(),
            owner_id: chamber.owner_id(),
            fill_count: chamber.fill_count(),
            origin: chamber.origin(),
        }
    }
}

impl From<ChamberSnapshot> for Chamber {
    fn from(snapshot: ChamberSnapshot) -> Self {
        Chamber::from_snapshot(
            snapshot.id,
            snapshot.tier,
            snapshot.location,
            snapshot.owner_id,
            snapshot.fill_count,
            snapshot.origin,
        )
    }
}

/// Participant state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub id: ParticipantId,
    pub address: String,
    pub balance: i64,
    pub referrer: Option<ParticipantId>,
    pub mounting: Option<Mounting>,
}

impl From<&Participant> for ParticipantSnapshot {
    fn from(participant: &Participant) -> Self {
        ParticipantSnapshot {
            id: participant.id(),
            address: participant.address().to_string(),
            balance: participant.balance(),
            referrer: participant.referrer(),
            mounting: participant.mounting(),
        }
    }
}

impl From<ParticipantSnapshot> for Participant {
    fn from(snapshot: ParticipantSnapshot) -> Self {
        Participant::from_snapshot(
            snapshot.id,
            snapshot.address,
            snapshot.balance,
            snapshot.referrer,
            snapshot.mounting,
        )
    }
}

// ============================================================================
// Capture / Restore
// ============================================================================

impl MatrixEngine {
    /// Capture the complete engine state
    pub fn snapshot(&self) -> MatrixSnapshot {
        MatrixSnapshot {
            chambers: self.state().chambers().map(ChamberSnapshot::from).collect(),
            participants: self.state().participants().map(ParticipantSnapshot::from).collect(),
            ledger: self.state().ledger().clone(),
            referrals: self.state().referrals().to_vec(),
            vouchers: self.state().vouchers().cloned().collect(),
            audit_log: self.audit_log().clone(),
        }
    }

    /// Rebuild an engine from a validated snapshot
    pub fn from_snapshot(config: MatrixConfig, snapshot: MatrixSnapshot) -> Result<Self, EngineError> {
        let mut engine = MatrixEngine::new(config)?;
        validate_snapshot(&snapshot)?;

        let state = MatrixState::from_snapshot_rows(
            snapshot.chambers.into_iter().map(Chamber::from).collect(),
            snapshot.participants.into_iter().map(Participant::from).collect(),
            snapshot.ledger,
            snapshot.referrals,
            snapshot.vouchers,
        );
        engine.replace_state(state, snapshot.audit_log);
        Ok(engine)
    }

    pub(crate) fn replace_state(&mut self, state: MatrixState, audit_log: EventLog) {
        self.state = state;
        self.audit_log = audit_log;
    }
}

// ============================================================================
// State Digest
// ============================================================================

/// Compute a deterministic SHA256 digest of a snapshot
///
/// Serializes to JSON, recursively sorts all object keys for a canonical
/// representation, then hashes the canonical string. Equal states digest
/// equal regardless of map iteration order.
pub fn state_digest(snapshot: &MatrixSnapshot) -> Result<String, SnapshotError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(snapshot)
        .map_err(|e| SnapshotError::Serialization(format!("Snapshot serialization failed: {}", e)))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let canonical = canonicalize(value);
    let json = serde_json::to_string(&canonical)
        .map_err(|e| SnapshotError::Serialization(format!("Snapshot serialization failed: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation
// ============================================================================

/// Validate snapshot integrity
///
/// Checks the invariants the live engine maintains:
/// - fill counts within [1, capacity]; location tier matches chamber tier
/// - location and address uniqueness; owners of chambers exist
/// - every non-root chamber's structural parent exists
/// - each participant's balance equals the sum of their ledger credits
/// - at most one safe-completion credit per chamber, and only for full safes
pub fn validate_snapshot(snapshot: &MatrixSnapshot) -> Result<(), SnapshotError> {
    let mut locations = HashSet::new();
    let mut participant_ids = HashSet::new();
    let mut addresses = HashSet::new();

    for participant in &snapshot.participants {
        if !participant_ids.insert(participant.id) {
            return Err(SnapshotError::Validation(format!(
                "Duplicate participant id {}",
                participant.id
            )));
        }
        if !addresses.insert(participant.address.as_str()) {
            return Err(SnapshotError::Validation(format!(
                "Duplicate participant address {}",
                participant.address
            )));
        }
    }

    for chamber in &snapshot.chambers {
        if chamber.fill_count == 0 || chamber.fill_count > SAFE_CAPACITY {
            return Err(SnapshotError::Validation(format!(
                "Chamber {} fill count {} out of range",
                chamber.id, chamber.fill_count
            )));
        }
        if chamber.location.tier() != chamber.tier {
            return Err(SnapshotError::Validation(format!(
                "Chamber {} tier {} disagrees with location {}",
                chamber.id, chamber.tier, chamber.location
            )));
        }
        if !locations.insert(chamber.location) {
            return Err(SnapshotError::Validation(format!(
                "Duplicate chamber location {}",
                chamber.location
            )));
        }
        if !participant_ids.contains(&chamber.owner_id) {
            return Err(SnapshotError::Validation(format!(
                "Chamber {} owned by unknown participant {}",
                chamber.id, chamber.owner_id
            )));
        }
    }

    // Structural closure: every non-root chamber hangs off an existing parent.
    for chamber in &snapshot.chambers {
        if let Some(parent) = chamber.location.parent() {
            if !locations.contains(&parent) {
                return Err(SnapshotError::Validation(format!(
                    "Chamber at {} has no parent chamber at {}",
                    chamber.location, parent
                )));
            }
        }
    }

    // Balance = ledger: the core credits balances only through the ledger.
    let mut credited: HashMap<ParticipantId, i64> = HashMap::new();
    for entry in snapshot.ledger.entries() {
        *credited.entry(entry.owner_id()).or_insert(0) += entry.amount();
    }
    for participant in &snapshot.participants {
        let expected = credited.get(&participant.id).copied().unwrap_or(0);
        if participant.balance != expected {
            return Err(SnapshotError::Validation(format!(
                "Participant {} balance {} does not match ledger total {}",
                participant.id, participant.balance, expected
            )));
        }
    }

    // One safe payout per completed chamber, none for open ones.
    let fill_by_id: HashMap<ChamberId, u8> =
        snapshot.chambers.iter().map(|c| (c.id, c.fill_count)).collect();
    let mut paid_chambers = HashSet::new();
    for entry in snapshot.ledger.entries() {
        if entry.code() != EarningCode::Safe {
            continue;
        }
        let LedgerRef::Chamber(chamber_id) = entry.reference() else {
            return Err(SnapshotError::Validation(format!(
                "Safe credit {} does not reference a chamber",
                entry.seq()
            )));
        };
        if !paid_chambers.insert(chamber_id) {
            return Err(SnapshotError::Validation(format!(
                "Chamber {} paid more than one safe credit",
                chamber_id
            )));
        }
        match fill_by_id.get(&chamber_id) {
            Some(&fill) if fill == SAFE_CAPACITY => {}
            Some(_) => {
                return Err(SnapshotError::Validation(format!(
                    "Chamber {} paid a safe credit while still open",
                    chamber_id
                )));
            }
            None => {
                return Err(SnapshotError::Validation(format!(
                    "Safe credit references unknown chamber {}",
                    chamber_id
                )));
            }
        }
    }

    Ok(())
}

/// Check that the live anchor index matches a rebuild from the chamber table
///
/// The index is maintained incrementally; this compares it against ground
/// truth, for tests and integrity audits.
pub fn verify_anchor_index(state: &MatrixState) -> Result<(), SnapshotError> {
    let rebuilt = AnchorIndex::rebuild(state.chambers());
    if state.anchor_index() != &rebuilt {
        return Err(SnapshotError::Validation(
            "Anchor index disagrees with chamber table".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MatrixConfig;

    fn engine_with_members(count: usize) -> MatrixEngine {
        let mut engine = MatrixEngine::new(MatrixConfig::default()).unwrap();
        for i in 0..count {
            let member = engine.add_participant(format!("0x{:040}", i)).unwrap();
            engine.enroll(member, None).unwrap();
        }
        engine
    }

    #[test]
    fn test_digest_is_deterministic() {
        let engine = engine_with_members(3);
        let hash_1 = state_digest(&engine.snapshot()).unwrap();
        let hash_2 = state_digest(&engine.snapshot()).unwrap();
        assert_eq!(hash_1, hash_2);
    }

    #[test]
    fn test_digest_changes_with_state() {
        let mut engine = engine_with_members(3);
        let before = state_digest(&engine.snapshot()).unwrap();

        let member = engine.add_participant("0xnew".to_string()).unwrap();
        engine.enroll(member, None).unwrap();

        let after = state_digest(&engine.snapshot()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_validate_rejects_orphan_chamber() {
        let engine = engine_with_members(2);
        let mut snapshot = engine.snapshot();
        // Detach a chamber to a location whose parent does not exist.
        snapshot.chambers[1].location = "1.3.4".parse().unwrap();

        let result = validate_snapshot(&snapshot);
        assert!(matches!(result, Err(SnapshotError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_balance_drift() {
        let engine = engine_with_members(2);
        let mut snapshot = engine.snapshot();
        snapshot.participants[0].balance += 1;

        let result = validate_snapshot(&snapshot);
        assert!(matches!(result, Err(SnapshotError::Validation(_))));
    }

    #[test]
    fn test_anchor_index_matches_rebuild() {
        let engine = engine_with_members(8);
        verify_anchor_index(engine.state()).unwrap();
    }
}
