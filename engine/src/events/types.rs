//! Matrix event types
//!
//! The core emits exactly two event kinds. `ChamberCreated` drives the
//! upward cascade; `SafeCompleted` drives the payout and the next-tier
//! placement. Both are dispatched synchronously, in order, inside the
//! operation that raised them; external listeners only ever see them
//! after the operation has committed.

use crate::coords::Location;
use crate::models::{ChamberId, ParticipantId, UnlockOrigin};
use serde::{Deserialize, Serialize};

/// A state change the matrix pipeline reacts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatrixEvent {
    /// A chamber was created and persisted
    ChamberCreated {
        chamber_id: ChamberId,
        location: Location,
        owner_id: ParticipantId,
        tier: u8,
        origin: UnlockOrigin,
    },

    /// A chamber's safe reached capacity
    SafeCompleted {
        chamber_id: ChamberId,
        location: Location,
        owner_id: ParticipantId,
        tier: u8,
    },
}

impl MatrixEvent {
    /// Short description of the event kind
    pub fn event_type(&self) -> &'static str {
        match self {
            MatrixEvent::ChamberCreated { .. } => "ChamberCreated",
            MatrixEvent::SafeCompleted { .. } => "SafeCompleted",
        }
    }

    /// Location the event refers to
    pub fn location(&self) -> Location {
        match self {
            MatrixEvent::ChamberCreated { location, .. } => *location,
            MatrixEvent::SafeCompleted { location, .. } => *location,
        }
    }

    /// Participant the event concerns
    pub fn owner_id(&self) -> ParticipantId {
        match self {
            MatrixEvent::ChamberCreated { owner_id, .. } => *owner_id,
            MatrixEvent::SafeCompleted { owner_id, .. } => *owner_id,
        }
    }

    /// Tier the event occurred in
    pub fn tier(&self) -> u8 {
        match self {
            MatrixEvent::ChamberCreated { tier, .. } => *tier,
            MatrixEvent::SafeCompleted { tier, .. } => *tier,
        }
    }
}

/// Audit log of every event the pipeline handled
///
/// Ordered by dispatch, which is also causal order: a completion always
/// appears after the creation that filled the safe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<MatrixEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, event: MatrixEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[MatrixEvent] {
        &self.events
    }

    /// Events of one kind, in dispatch order
    pub fn events_of_type(&self, event_type: &str) -> Vec<&MatrixEvent> {
        self.events
            .iter()
            .filter(|event| event.event_type() == event_type)
            .collect()
    }

    /// Roll the log back to a previous length
    ///
    /// Used by the engine to drop the events of an operation that failed
    /// after partially dispatching.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// Events concerning one participant, in dispatch order
    pub fn events_for_owner(&self, owner_id: ParticipantId) -> Vec<&MatrixEvent> {
        self.events
            .iter()
            .filter(|event| event.owner_id() == owner_id)
            .collect()
    }
}
