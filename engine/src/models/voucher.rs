//! Voucher (chamber unlock key) records
//!
//! A voucher is a prepaid, single-use key that unlocks one chamber outside
//! the registration flow. Only the SHA-256 digest of the issued code is
//! stored; the plaintext code exists once, in the issuance response.

use crate::models::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single-use chamber unlock key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    /// Creation-ordered identifier
    id: u64,

    /// SHA-256 hex digest of the issued code
    code_hash: String,

    /// Participant who redeemed the voucher; set at most once
    redeemed_by: Option<ParticipantId>,
}

impl Voucher {
    pub(crate) fn new(id: u64, code_hash: String) -> Self {
        Self {
            id,
            code_hash,
            redeemed_by: None,
        }
    }

    /// Digest a plaintext voucher code for storage or lookup
    pub fn hash_code(code: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(code.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn code_hash(&self) -> &str {
        &self.code_hash
    }

    pub fn redeemed_by(&self) -> Option<ParticipantId> {
        self.redeemed_by
    }

    pub fn is_redeemed(&self) -> bool {
        self.redeemed_by.is_some()
    }

    /// Mark the voucher consumed by a participant
    pub(crate) fn mark_redeemed(&mut self, participant_id: ParticipantId) {
        debug_assert!(self.redeemed_by.is_none(), "voucher redeemed twice");
        self.redeemed_by = Some(participant_id);
    }
}
