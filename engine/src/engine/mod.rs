//! Matrix engine: public operations and the event pipeline
//!
//! The engine owns the matrix state and exposes the operations external
//! collaborators call:
//!
//! - `add_participant`: account-collaborator boundary
//! - `issue_voucher` / `redeem_voucher`: voucher-collaborator boundary
//! - `enroll`: registration. Anchor resolution, placement, referral
//!   bookkeeping, and the full cascade pipeline
//!
//! # Pipeline
//!
//! Each mutating operation runs as one logical transaction:
//!
//! ```text
//! 1. Validate inputs against current state
//! 2. Back up state
//! 3. Apply bookkeeping + placement; enqueue ChamberCreated
//! 4. Drain the event queue in FIFO order:
//!      ChamberCreated  → cascade two hops up; may enqueue SafeCompleted
//!      SafeCompleted   → pay the owner; place the next-tier chamber,
//!                        which enqueues another ChamberCreated
//! 5. On any error: restore the backup; nothing partial is observable
//! 6. On success: append events to the audit log, notify observers
//! ```
//!
//! Recursive tier growth is therefore queue iteration, not call-stack
//! recursion; it terminates because advancement strictly increases the tier
//! and stops at the configured cap.

pub mod checkpoint;

use crate::cascade;
use crate::coords::{Location, MAX_TIER};
use crate::earnings::{self, EarningsSchedule, ReferralEarnings};
use crate::events::{EventLog, MatrixEvent, MatrixObserver};
use crate::models::{
    ChamberId, MatrixState, Mounting, ParticipantId, UnlockOrigin, Voucher,
};
use crate::placement::{self, AnchorResolution, AnchorSelector, PlacementError, PlacementOutcome};
use crate::safemap::{build_safe_map, SafeMap};
use checkpoint::SnapshotError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Configuration
// ============================================================================

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Highest tier chambers may reach; completions at this tier do not
    /// advance further
    pub max_tier: u8,

    /// Safe-completion payout per tier
    pub safe_earnings: EarningsSchedule,

    /// Referral payout per guardian-chain depth
    pub referral_earnings: ReferralEarnings,

    /// Whether a full or unknown named upline falls back to the earliest
    /// open anchor (`false` rejects the registration instead)
    pub fallback_on_full_upline: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            max_tier: MAX_TIER,
            safe_earnings: EarningsSchedule::default(),
            referral_earnings: ReferralEarnings::default(),
            fallback_on_full_upline: true,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Voucher redemption failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoucherError {
    #[error("Voucher code is not recognized")]
    Unknown,

    #[error("Voucher was already redeemed by participant {0}")]
    AlreadyRedeemed(ParticipantId),
}

/// Errors surfaced by engine operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    #[error("Address already registered: {0}")]
    DuplicateAddress(String),

    #[error("Participant {0} already holds a registration chamber")]
    AlreadyEnrolled(ParticipantId),

    #[error("Placement error: {0}")]
    Placement(#[from] PlacementError),

    #[error("Voucher error: {0}")]
    Voucher(#[from] VoucherError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

// ============================================================================
// Receipts
// ============================================================================

/// Outcome of an enrollment or voucher redemption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentReceipt {
    /// The chamber created for the caller
    pub chamber_id: ChamberId,

    /// Where it was placed
    pub location: Location,

    /// Tier it was placed in (always 1 for the public operations)
    pub tier: u8,

    /// How the anchor was resolved
    pub resolution: AnchorResolution,

    /// Safes completed by the cascade this operation triggered,
    /// tier-advancement chains included
    pub safes_completed: usize,
}

// ============================================================================
// Engine
// ============================================================================

/// The matrix engine
///
/// # Example
///
/// ```rust
/// use khazon_matrix_core_rs::engine::{MatrixConfig, MatrixEngine};
///
/// let mut engine = MatrixEngine::new(MatrixConfig::default()).unwrap();
/// let founder = engine.add_participant("0xf00".to_string()).unwrap();
/// let receipt = engine.enroll(founder, None).unwrap();
/// assert_eq!(receipt.location.to_string(), "1.1.1");
/// ```
pub struct MatrixEngine {
    config: MatrixConfig,
    state: MatrixState,

    /// Pending events of the operation in flight; empty between operations
    queue: VecDeque<MatrixEvent>,

    /// Every event ever dispatched, in causal order
    audit_log: EventLog,

    /// Post-commit, read-only subscribers
    observers: Vec<Box<dyn MatrixObserver>>,
}

impl MatrixEngine {
    /// Create an engine with an empty matrix
    pub fn new(config: MatrixConfig) -> Result<Self, EngineError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            state: MatrixState::new(),
            queue: VecDeque::new(),
            audit_log: EventLog::new(),
            observers: Vec::new(),
        })
    }

    fn validate_config(config: &MatrixConfig) -> Result<(), EngineError> {
        if config.max_tier == 0 || config.max_tier > MAX_TIER {
            return Err(EngineError::InvalidConfig(format!(
                "max_tier must be between 1 and {}, got {}",
                MAX_TIER, config.max_tier
            )));
        }
        if config.safe_earnings.tiers() == 0 {
            return Err(EngineError::InvalidConfig(
                "safe earnings schedule must cover at least one tier".to_string(),
            ));
        }
        if config.safe_earnings.amounts().iter().any(|amount| *amount <= 0) {
            return Err(EngineError::InvalidConfig(
                "safe earnings amounts must be positive".to_string(),
            ));
        }
        for depth in 1..=crate::models::MAX_REFERRAL_DEPTH {
            if config.referral_earnings.amount_for(depth).unwrap_or(0) <= 0 {
                return Err(EngineError::InvalidConfig(
                    "referral earnings amounts must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Register a post-commit observer
    pub fn subscribe(&mut self, observer: Box<dyn MatrixObserver>) {
        self.observers.push(observer);
    }

    // ========================================================================
    // Collaborator boundaries
    // ========================================================================

    /// Create a participant account with a unique address
    pub fn add_participant(&mut self, address: String) -> Result<ParticipantId, EngineError> {
        if self.state.participant_by_address(&address).is_some() {
            return Err(EngineError::DuplicateAddress(address));
        }
        Ok(self.state.create_participant(address))
    }

    /// Issue a single-use voucher, returning the plaintext code
    ///
    /// Only the code's digest is stored; the returned string is the one
    /// copy of the plaintext.
    pub fn issue_voucher(&mut self) -> String {
        let code = format!("KTA-{}", Uuid::new_v4().simple());
        self.state.create_voucher(Voucher::hash_code(&code));
        code
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Place a registering participant into the matrix
    ///
    /// Resolves the anchor (the named upline's chamber, the earliest open
    /// anchor, or genesis), creates the tier-1 chamber, records mounting
    /// and referral bookkeeping, and drains the full cascade pipeline,
    /// all as one transaction.
    pub fn enroll(
        &mut self,
        owner_id: ParticipantId,
        upline: Option<ParticipantId>,
    ) -> Result<EnrollmentReceipt, EngineError> {
        if self.state.participant(owner_id).is_none() {
            return Err(EngineError::ParticipantNotFound(owner_id));
        }
        if let Some(upline_id) = upline {
            if self.state.participant(upline_id).is_none() {
                return Err(EngineError::ParticipantNotFound(upline_id));
            }
        }
        let already_enrolled = self
            .state
            .chambers_of(owner_id)
            .iter()
            .any(|chamber| chamber.origin() == UnlockOrigin::SelfRegistration);
        if already_enrolled {
            return Err(EngineError::AlreadyEnrolled(owner_id));
        }

        self.transactional(|engine| {
            // Referral bookkeeping comes first, matching the registration
            // order: guardian chain, then the chamber itself.
            if let Some(guardian_id) = upline {
                engine
                    .state
                    .participant_mut(owner_id)
                    .expect("validated above")
                    .set_referrer(guardian_id);
                earnings::apply_referral_chain(
                    &mut engine.state,
                    &engine.config.referral_earnings,
                    guardian_id,
                    owner_id,
                );
            }

            let outcome = placement::place_new_chamber(
                &mut engine.state,
                owner_id,
                upline.map(AnchorSelector::Upline),
                1,
                UnlockOrigin::SelfRegistration,
                engine.config.fallback_on_full_upline,
            )?;
            engine.record_mounting(owner_id, upline, &outcome);
            engine.enqueue_created(&outcome, UnlockOrigin::SelfRegistration, owner_id);

            let safes_completed = engine.run_pipeline()?;
            Ok(EnrollmentReceipt {
                chamber_id: outcome.chamber_id,
                location: outcome.location,
                tier: outcome.tier,
                resolution: outcome.resolution,
                safes_completed,
            })
        })
    }

    /// Redeem a voucher for an additional chamber
    ///
    /// The voucher is consumed and a voucher-origin chamber is placed under
    /// the earliest open anchor (or as genesis on an empty tier). Voucher
    /// chambers cascade normally but are never auto-selected as anchors.
    pub fn redeem_voucher(
        &mut self,
        owner_id: ParticipantId,
        code: &str,
    ) -> Result<EnrollmentReceipt, EngineError> {
        if self.state.participant(owner_id).is_none() {
            return Err(EngineError::ParticipantNotFound(owner_id));
        }
        let code_hash = Voucher::hash_code(code);
        match self.state.voucher_by_hash(&code_hash) {
            None => return Err(VoucherError::Unknown.into()),
            Some(voucher) => {
                if let Some(redeemer) = voucher.redeemed_by() {
                    return Err(VoucherError::AlreadyRedeemed(redeemer).into());
                }
            }
        }

        self.transactional(|engine| {
            engine
                .state
                .voucher_by_hash_mut(&code_hash)
                .expect("validated above")
                .mark_redeemed(owner_id);

            let outcome = placement::place_new_chamber(
                &mut engine.state,
                owner_id,
                None,
                1,
                UnlockOrigin::VoucherRedemption,
                engine.config.fallback_on_full_upline,
            )?;
            engine.enqueue_created(&outcome, UnlockOrigin::VoucherRedemption, owner_id);

            let safes_completed = engine.run_pipeline()?;
            Ok(EnrollmentReceipt {
                chamber_id: outcome.chamber_id,
                location: outcome.location,
                tier: outcome.tier,
                resolution: outcome.resolution,
                safes_completed,
            })
        })
    }

    // ========================================================================
    // Read surface
    // ========================================================================

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    pub fn state(&self) -> &MatrixState {
        &self.state
    }

    pub fn audit_log(&self) -> &EventLog {
        &self.audit_log
    }

    /// Assemble the safe map of an anchor location
    pub fn safe_map(&self, anchor: Location) -> SafeMap {
        build_safe_map(&self.state, anchor)
    }

    /// A participant's chambers in creation order
    pub fn chambers_of(&self, owner_id: ParticipantId) -> Vec<&crate::models::Chamber> {
        self.state.chambers_of(owner_id)
    }

    /// A participant's reward balance
    pub fn balance_of(&self, owner_id: ParticipantId) -> Option<i64> {
        self.state.participant(owner_id).map(|p| p.balance())
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Run a closure as one transaction: on error the state is restored to
    /// the entry backup and the pending queue is discarded; on success the
    /// dispatched events reach the audit log and the observers.
    fn transactional<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        debug_assert!(self.queue.is_empty(), "queue must be drained between operations");
        let backup = self.state.clone();
        let audit_mark = self.audit_log.len();

        match operation(self) {
            Ok(value) => {
                let committed: Vec<MatrixEvent> =
                    self.audit_log.events()[audit_mark..].to_vec();
                for event in &committed {
                    for observer in &self.observers {
                        observer.observe(event);
                    }
                }
                Ok(value)
            }
            Err(error) => {
                self.state = backup;
                self.queue.clear();
                self.audit_log.truncate(audit_mark);
                Err(error)
            }
        }
    }

    fn enqueue_created(
        &mut self,
        outcome: &PlacementOutcome,
        origin: UnlockOrigin,
        owner_id: ParticipantId,
    ) {
        self.queue.push_back(MatrixEvent::ChamberCreated {
            chamber_id: outcome.chamber_id,
            location: outcome.location,
            owner_id,
            tier: outcome.tier,
            origin,
        });
    }

    /// Record how a registration was anchored on the participant
    ///
    /// Honored and adjusted placements keep the upline the caller named;
    /// an adjustment changes the anchor, not who was asked for. Automatic
    /// placements record the owner of the anchor actually selected.
    fn record_mounting(
        &mut self,
        owner_id: ParticipantId,
        requested_upline: Option<ParticipantId>,
        outcome: &PlacementOutcome,
    ) {
        let Some(policy) = outcome.resolution.mounting_policy() else {
            return; // genesis placements have no upline to record
        };
        let upline_id = match outcome.resolution {
            AnchorResolution::Honored | AnchorResolution::Adjusted => requested_upline,
            _ => outcome.anchor_owner,
        };
        if let Some(upline_id) = upline_id {
            self.state
                .participant_mut(owner_id)
                .expect("participant validated by caller")
                .set_mounting(Mounting { upline_id, policy });
        }
    }

    /// Drain the event queue, returning how many safes completed
    fn run_pipeline(&mut self) -> Result<usize, EngineError> {
        let mut safes_completed = 0;

        while let Some(event) = self.queue.pop_front() {
            match event {
                MatrixEvent::ChamberCreated { location, .. } => {
                    if let Some(completion) = cascade::propagate(&mut self.state, location) {
                        self.queue.push_back(MatrixEvent::SafeCompleted {
                            chamber_id: completion.chamber_id,
                            location: completion.location,
                            owner_id: completion.owner_id,
                            tier: completion.tier,
                        });
                    }
                }
                MatrixEvent::SafeCompleted {
                    chamber_id,
                    owner_id,
                    tier,
                    ..
                } => {
                    safes_completed += 1;
                    earnings::apply_safe_completion(
                        &mut self.state,
                        &self.config.safe_earnings,
                        chamber_id,
                        owner_id,
                        tier,
                    );
                    if tier < self.config.max_tier {
                        let outcome = placement::place_new_chamber(
                            &mut self.state,
                            owner_id,
                            None,
                            tier + 1,
                            UnlockOrigin::TierAdvancement,
                            self.config.fallback_on_full_upline,
                        )?;
                        self.enqueue_created(&outcome, UnlockOrigin::TierAdvancement, owner_id);
                    }
                }
            }
            self.audit_log.log(event);
        }

        Ok(safes_completed)
    }
}
