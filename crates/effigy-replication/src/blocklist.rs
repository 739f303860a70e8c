//! Replicated namespace blocklist
//!
//! Operator-facing emergency brake: namespaces on the list are rejected by
//! the enforcement gate before any cache or remote work. Local reads go
//! straight to the local replica; `add`/`remove` resolve once the local
//! replica has applied and published the update, never waiting for remote
//! convergence.

use crate::gossip::{GossipEnvelope, ReplicaTransport};
use crate::orset::OrSet;
use effigy_core::{EffigyError, EffigyResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Snapshot emitted to subscribers whenever the merged set value changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistChanged {
    /// The blocked namespaces after the change
    pub blocked: BTreeSet<String>,
}

struct BlocklistInner {
    replica_id: Uuid,
    set: RwLock<OrSet<String>>,
    transport: Arc<dyn ReplicaTransport>,
    changes: broadcast::Sender<BlocklistChanged>,
}

/// One cluster member's view of the replicated blocklist
///
/// Cheap to clone; clones share the replica. Call [`start`](Self::start)
/// once to run the merge loop consuming peer states.
pub struct NamespaceBlocklist {
    inner: Arc<BlocklistInner>,
}

impl Clone for NamespaceBlocklist {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl NamespaceBlocklist {
    /// Create a replica attached to the given transport
    pub fn new(transport: Arc<dyn ReplicaTransport>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(BlocklistInner {
                replica_id: Uuid::new_v4(),
                set: RwLock::new(OrSet::new()),
                transport,
                changes,
            }),
        }
    }

    /// Spawn the merge loop consuming peer states from the transport.
    ///
    /// The loop survives lagged receivers by skipping to live data (a missed
    /// state is recovered by the next publish, since every publish carries
    /// full state) and exits when the transport closes.
    pub fn start(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let mut rx = inner.transport.subscribe();
        tokio::spawn(async move {
            debug!(replica = %inner.replica_id, "blocklist merge loop started");
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        if envelope.origin == inner.replica_id {
                            continue;
                        }
                        let changed = inner.set.write().await.merge(&envelope.state);
                        if changed {
                            inner.notify().await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "blocklist gossip lagged, skipping to live state");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(replica = %inner.replica_id, "blocklist merge loop stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Local, eventually consistent membership check
    pub async fn contains(&self, namespace: &str) -> bool {
        self.inner.set.read().await.contains(&namespace.to_string())
    }

    /// The currently blocked namespaces, as seen by this replica
    pub async fn blocked(&self) -> BTreeSet<String> {
        self.inner.set.read().await.elements()
    }

    /// Block a namespace.
    ///
    /// Resolves once the local replica has applied and published the update;
    /// remote replicas converge eventually.
    pub async fn add(&self, namespace: impl Into<String>) -> EffigyResult<()> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(EffigyError::invalid("namespace must not be empty"));
        }
        info!(%namespace, "blocking namespace");
        let state = {
            let mut set = self.inner.set.write().await;
            set.add(namespace);
            set.clone()
        };
        self.inner.publish(state).await?;
        self.inner.notify().await;
        Ok(())
    }

    /// Unblock a namespace; a no-op when it is not blocked here
    pub async fn remove(&self, namespace: &str) -> EffigyResult<()> {
        let namespace = namespace.to_string();
        let (state, changed) = {
            let mut set = self.inner.set.write().await;
            let was_blocked = set.contains(&namespace);
            set.remove(&namespace);
            (set.clone(), was_blocked)
        };
        if changed {
            info!(%namespace, "unblocking namespace");
            self.inner.publish(state).await?;
            self.inner.notify().await;
        }
        Ok(())
    }

    /// Receive a notification each time the merged set value changes
    pub fn subscribe_for_changes(&self) -> broadcast::Receiver<BlocklistChanged> {
        self.inner.changes.subscribe()
    }
}

impl BlocklistInner {
    async fn publish(&self, state: OrSet<String>) -> EffigyResult<()> {
        self.transport
            .publish(GossipEnvelope {
                origin: self.replica_id,
                state,
            })
            .await
    }

    async fn notify(&self) {
        let blocked = self.set.read().await.elements();
        // nobody subscribed is fine
        let _ = self.changes.send(BlocklistChanged { blocked });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gossip::GossipBus;
    use assert_matches::assert_matches;
    use std::time::Duration;

    async fn converged(replica: &NamespaceBlocklist, namespace: &str, expect: bool) {
        for _ in 0..50 {
            if replica.contains(namespace).await == expect {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("replica did not converge on {namespace} = {expect}");
    }

    #[tokio::test]
    async fn local_add_and_remove_are_immediate() {
        let bus = Arc::new(GossipBus::default());
        let replica = NamespaceBlocklist::new(bus);
        let _ = replica.start();

        replica.add("org.blocked").await.unwrap();
        assert!(replica.contains("org.blocked").await);
        assert!(!replica.contains("org.fine").await);

        replica.remove("org.blocked").await.unwrap();
        assert!(!replica.contains("org.blocked").await);
    }

    #[tokio::test]
    async fn empty_namespace_is_rejected() {
        let replica = NamespaceBlocklist::new(Arc::new(GossipBus::default()));
        assert_matches!(
            replica.add("").await,
            Err(EffigyError::Invalid { .. })
        );
    }

    #[tokio::test]
    async fn replicas_converge_over_the_bus() {
        let bus = Arc::new(GossipBus::default());
        let a = NamespaceBlocklist::new(bus.clone() as Arc<dyn ReplicaTransport>);
        let b = NamespaceBlocklist::new(bus as Arc<dyn ReplicaTransport>);
        let _ = a.start();
        let _ = b.start();

        a.add("org.blocked").await.unwrap();
        converged(&b, "org.blocked", true).await;

        b.remove("org.blocked").await.unwrap();
        converged(&a, "org.blocked", false).await;
    }

    #[tokio::test]
    async fn subscribers_see_local_and_remote_changes() {
        let bus = Arc::new(GossipBus::default());
        let a = NamespaceBlocklist::new(bus.clone() as Arc<dyn ReplicaTransport>);
        let b = NamespaceBlocklist::new(bus as Arc<dyn ReplicaTransport>);
        let _ = a.start();
        let _ = b.start();
        let mut changes = b.subscribe_for_changes();

        a.add("org.blocked").await.unwrap();
        let change = tokio::time::timeout(Duration::from_secs(1), changes.recv())
            .await
            .expect("no change notification")
            .unwrap();
        assert!(change.blocked.contains("org.blocked"));

        b.add("org.other").await.unwrap();
        let change = tokio::time::timeout(Duration::from_secs(1), changes.recv())
            .await
            .expect("no change notification")
            .unwrap();
        assert_eq!(
            change.blocked,
            BTreeSet::from(["org.blocked".to_string(), "org.other".to_string()])
        );
    }
}
