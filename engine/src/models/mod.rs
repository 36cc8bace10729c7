//! Domain types: chambers, participants, ledger, referrals, vouchers, state

pub mod anchor_index;
pub mod chamber;
pub mod ledger;
pub mod participant;
pub mod referral;
pub mod state;
pub mod voucher;

pub use anchor_index::AnchorIndex;
pub use chamber::{Chamber, ChamberId, UnlockOrigin, SAFE_CAPACITY};
pub use ledger::{EarningCode, Ledger, LedgerEntry, LedgerRef, UNITS_PER_KTA};
pub use participant::{Mounting, MountingPolicy, Participant, ParticipantId};
pub use referral::{Referral, MAX_REFERRAL_DEPTH};
pub use state::MatrixState;
pub use voucher::Voucher;
