//! Khazon Matrix Core - Rust Engine
//!
//! Tiered, capacity-bounded placement matrix with deterministic cascade
//! execution.
//!
//! # Architecture
//!
//! - **coords**: Location codec for `"tier.row.pos"` positions
//! - **models**: Domain types (Chamber, Participant, Ledger, MatrixState)
//! - **safemap**: Fixed-order enumeration of a chamber's 7 safe positions
//! - **placement**: Anchor resolution and slot allocation
//! - **cascade**: Two-hop upward fill propagation and completion detection
//! - **earnings**: Safe-completion payouts and referral credits
//! - **events**: Event types, audit log, read-only observers
//! - **engine**: Public operations, the event pipeline, checkpointing
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 fixed-point units (10_000 units = 1 KTA)
//! 2. Every mutating operation is one transaction: the placement, both
//!    ancestor increments, any payout, and any tier advancement commit
//!    together or not at all
//! 3. A safe completes exactly once, paying exactly one ledger credit

// Module declarations
pub mod cascade;
pub mod coords;
pub mod earnings;
pub mod engine;
pub mod events;
pub mod models;
pub mod placement;
pub mod safemap;

// Re-exports for convenience
pub use cascade::Completion;
pub use coords::{Location, LocationParseError};
pub use earnings::{EarningsSchedule, ReferralEarnings};
pub use engine::{
    checkpoint::{state_digest, validate_snapshot, MatrixSnapshot, SnapshotError},
    EngineError, EnrollmentReceipt, MatrixConfig, MatrixEngine, VoucherError,
};
pub use events::{EventLog, MatrixEvent, MatrixObserver, TracingObserver};
pub use models::{
    Chamber, ChamberId, EarningCode, Ledger, LedgerEntry, LedgerRef, MatrixState, Mounting,
    MountingPolicy, Participant, ParticipantId, UnlockOrigin, SAFE_CAPACITY, UNITS_PER_KTA,
};
pub use placement::{AnchorResolution, AnchorSelector, PlacementError, PlacementOutcome};
pub use safemap::{build_safe_map, SafeMap, SafeSlot, SlotKey};
