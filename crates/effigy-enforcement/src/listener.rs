//! Cache-invalidation listener
//!
//! Subscribes to the entity-change broadcast topic and evicts the enforcer
//! entry of each changed policy. Errors here are logged and dropped, never
//! propagated into the enforcement pipeline: a missed invalidation only
//! delays freshness, and the next load picks up the new revision.

use crate::events::{ChangeTopic, EntityChange};
use effigy_cache::{CacheKey, LoadingCache};
use effigy_core::{EffectiveEnforcer, EntityId, ResourceType};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Listener task evicting stale enforcer entries
pub struct InvalidationListener;

impl InvalidationListener {
    /// Subscribe to the topic and spawn the listener loop.
    ///
    /// The loop re-subscribes once when its receiver closes (pub/sub
    /// membership change); if the fresh subscription is closed too, the
    /// topic is gone and the loop exits.
    pub fn start(
        topic: Arc<dyn ChangeTopic>,
        cache: LoadingCache<CacheKey, EffectiveEnforcer>,
    ) -> JoinHandle<()> {
        let mut rx = topic.subscribe();
        tokio::spawn(async move {
            debug!("invalidation listener started");
            let mut resubscribed = false;
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        resubscribed = false;
                        Self::handle(&cache, change).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // missed invalidations delay freshness only
                        warn!(missed, "invalidation listener lagged behind the change topic");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        if resubscribed {
                            debug!("change topic gone, invalidation listener stopped");
                            break;
                        }
                        warn!("change topic closed, resubscribing");
                        rx = topic.subscribe();
                        resubscribed = true;
                    }
                }
            }
        })
    }

    async fn handle(cache: &LoadingCache<CacheKey, EffectiveEnforcer>, change: EntityChange) {
        if change.entity_type != ResourceType::Policy.as_str() {
            trace!(entity_type = %change.entity_type, "ignoring non-policy change");
            return;
        }
        match EntityId::parse(change.entity_id.as_str()) {
            Ok(id) => {
                debug!(policy = %id, revision = change.revision, "invalidating enforcer entry");
                cache.invalidate(&CacheKey::policy(id)).await;
            }
            Err(err) => {
                warn!(%err, entity_id = %change.entity_id, "dropping malformed change notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeBroadcast;
    use async_trait::async_trait;
    use effigy_cache::{CacheEntry, CacheLoader};
    use effigy_core::{CacheConfig, EffigyError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CacheLoader<CacheKey, EffectiveEnforcer> for CountingLoader {
        async fn load(
            &self,
            _key: &CacheKey,
        ) -> Result<CacheEntry<EffectiveEnforcer>, EffigyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CacheEntry::existent(100, EffectiveEnforcer::new()))
        }
    }

    fn policy_key(id: &str) -> CacheKey {
        CacheKey::policy(EntityId::parse(id).unwrap())
    }

    async fn drained(cache: &LoadingCache<CacheKey, EffectiveEnforcer>, key: &CacheKey) {
        for _ in 0..50 {
            if cache.get_if_present(key).await.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("entry for {key} was never invalidated");
    }

    #[tokio::test]
    async fn policy_change_invalidates_exactly_its_entry() {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let cache = LoadingCache::new(
            loader.clone() as Arc<dyn CacheLoader<CacheKey, EffectiveEnforcer>>,
            CacheConfig::default(),
        );
        let topic = Arc::new(ChangeBroadcast::default());
        let _ = InvalidationListener::start(topic.clone(), cache.clone());

        // seed the scenario: P1 at revision 5, P2 at revision 2
        let p1 = policy_key("org.acme:P1");
        let p2 = policy_key("org.acme:P2");
        assert!(cache.put(p1.clone(), CacheEntry::existent(5, EffectiveEnforcer::new())).await);
        assert!(cache.put(p2.clone(), CacheEntry::existent(2, EffectiveEnforcer::new())).await);

        topic.publish(EntityChange {
            entity_type: "policy".into(),
            entity_id: "org.acme:P1".into(),
            revision: 6,
        });
        drained(&cache, &p1).await;

        // P1 reloads; P2 is untouched and does not reload
        assert_matches::assert_matches!(cache.get(&p1).await, CacheEntry::Existent { .. });
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.get(&p2).await,
            CacheEntry::existent(2, EffectiveEnforcer::new())
        );
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrelated_and_malformed_changes_are_ignored() {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let cache = LoadingCache::new(
            loader as Arc<dyn CacheLoader<CacheKey, EffectiveEnforcer>>,
            CacheConfig::default(),
        );
        let topic = Arc::new(ChangeBroadcast::default());
        let _ = InvalidationListener::start(topic.clone(), cache.clone());

        let p1 = policy_key("org.acme:P1");
        assert!(cache.put(p1.clone(), CacheEntry::existent(5, EffectiveEnforcer::new())).await);

        // a thing change and a malformed policy id must both be no-ops
        topic.publish(EntityChange {
            entity_type: "thing".into(),
            entity_id: "org.acme:P1".into(),
            revision: 9,
        });
        topic.publish(EntityChange {
            entity_type: "policy".into(),
            entity_id: "not-an-entity-id".into(),
            revision: 9,
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            cache.get_if_present(&p1).await,
            Some(CacheEntry::existent(5, EffectiveEnforcer::new()))
        );
    }
}
