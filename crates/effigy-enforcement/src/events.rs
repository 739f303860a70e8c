//! Entity-change notifications consumed from the broadcast topic

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One entity-change notification
///
/// Produced by the persistence tier whenever an entity is written; the
/// invalidation listener reacts to the policy-typed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChange {
    /// Resource-type tag of the changed entity (`"policy"`, `"thing"`, ...)
    pub entity_type: String,
    /// Identifier of the changed entity
    pub entity_id: String,
    /// Revision written by the change
    pub revision: i64,
}

/// Subscription seam over the change topic.
///
/// The listener re-subscribes through this when its receiver closes, e.g.
/// after a pub/sub membership change.
pub trait ChangeTopic: Send + Sync {
    /// Open a fresh subscription to the topic
    fn subscribe(&self) -> broadcast::Receiver<EntityChange>;
}

/// In-process change topic over a `tokio` broadcast channel
#[derive(Debug, Clone)]
pub struct ChangeBroadcast {
    tx: broadcast::Sender<EntityChange>,
}

impl ChangeBroadcast {
    /// Create a topic with the given per-subscriber buffer
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a change to all subscribers
    pub fn publish(&self, change: EntityChange) {
        // no subscribers is fine; freshness is recovered on the next load
        let _ = self.tx.send(change);
    }
}

impl Default for ChangeBroadcast {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeTopic for ChangeBroadcast {
    fn subscribe(&self) -> broadcast::Receiver<EntityChange> {
        self.tx.subscribe()
    }
}
