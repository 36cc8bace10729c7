//! Read-only event observers
//!
//! External collaborators (alerting, email, dashboards) watch the matrix
//! through [`MatrixObserver`]. Observers are notified after the operation
//! that produced the events has committed, receive each event in dispatch
//! order, and have no way to fail or block the pipeline: the trait returns
//! nothing and the engine ignores whatever an observer does.

use crate::events::types::MatrixEvent;
use tracing::info;

/// A post-commit, read-only subscriber to matrix events
pub trait MatrixObserver: Send {
    fn observe(&self, event: &MatrixEvent);
}

/// Observer that mirrors events onto the tracing log
#[derive(Debug, Default)]
pub struct TracingObserver;

impl MatrixObserver for TracingObserver {
    fn observe(&self, event: &MatrixEvent) {
        match event {
            MatrixEvent::ChamberCreated { location, owner_id, .. } => {
                info!(%location, owner_id, "chamber created");
            }
            MatrixEvent::SafeCompleted { location, owner_id, tier, .. } => {
                info!(%location, owner_id, tier, "safe completed");
            }
        }
    }
}
