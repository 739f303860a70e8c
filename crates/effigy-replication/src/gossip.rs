//! Replica transport for blocklist state exchange
//!
//! State-based gossip: a replica publishes its full set state after every
//! local update and merges every state it receives. The in-process
//! [`GossipBus`] carries envelopes over a `tokio` broadcast channel; a
//! cluster deployment substitutes its own transport behind the same trait.

use crate::orset::OrSet;
use async_trait::async_trait;
use effigy_core::{EffigyError, GossipConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// One replica's published set state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipEnvelope {
    /// Publishing replica, so replicas can skip their own envelopes
    pub origin: Uuid,
    /// Full set state at publish time
    pub state: OrSet<String>,
}

/// Transport seam between blocklist replicas
#[async_trait]
pub trait ReplicaTransport: Send + Sync {
    /// Publish this replica's state to every peer
    async fn publish(&self, envelope: GossipEnvelope) -> Result<(), EffigyError>;

    /// Subscribe to states published by peers (and echoes of this replica's
    /// own publishes, which consumers filter by origin)
    fn subscribe(&self) -> broadcast::Receiver<GossipEnvelope>;
}

/// In-process gossip bus shared by all replicas of one test or
/// single-process deployment
#[derive(Debug, Clone)]
pub struct GossipBus {
    tx: broadcast::Sender<GossipEnvelope>,
}

impl GossipBus {
    /// Create a bus with the configured per-subscriber buffer
    pub fn new(config: &GossipConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity.max(1));
        Self { tx }
    }
}

impl Default for GossipBus {
    fn default() -> Self {
        Self::new(&GossipConfig::default())
    }
}

#[async_trait]
impl ReplicaTransport for GossipBus {
    async fn publish(&self, envelope: GossipEnvelope) -> Result<(), EffigyError> {
        // no subscribers is not an error; a lone replica is a valid cluster
        let _ = self.tx.send(envelope);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<GossipEnvelope> {
        self.tx.subscribe()
    }
}
