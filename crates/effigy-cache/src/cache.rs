//! Loading cache with single-flight loads and revision-gated writes
//!
//! The cache map and its in-flight table are the only shared mutable state.
//! Every write funnels through [`CacheEntry::may_replace`], so racing loads,
//! puts, and invalidations resolve by revision rather than arrival order.
//! Loads run on detached tasks: a caller that abandons its lookup never
//! cancels the load, and the late result is still installed (revision-gated,
//! so a stale result is harmless).

use crate::entry::CacheEntry;
use crate::loader::CacheLoader;
use effigy_core::{CacheConfig, EffigyError};
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, trace};

type SharedLoad<V> = Shared<BoxFuture<'static, CacheEntry<V>>>;

struct Slot<V> {
    entry: CacheEntry<V>,
    written_at: Instant,
}

struct CacheInner<K, V> {
    entries: RwLock<HashMap<K, Slot<V>>>,
    in_flight: Mutex<HashMap<K, SharedLoad<V>>>,
    loader: Arc<dyn CacheLoader<K, V>>,
    config: CacheConfig,
}

/// Key → [`CacheEntry`] store with a pluggable async loader
///
/// Cheap to clone; all clones share the same state. Constructed once at
/// service start and handed to every component that needs it.
pub struct LoadingCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for LoadingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache over the given loader
    pub fn new(loader: Arc<dyn CacheLoader<K, V>>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                loader,
                config,
            }),
        }
    }

    /// Look up an entry, loading it on miss.
    ///
    /// A cached authoritative entry returns immediately. A miss, an expired
    /// slot, or a `FetchFailed` leftover joins the in-flight load for the key
    /// if one exists, otherwise starts exactly one. All concurrent callers
    /// receive the same result; a `FetchFailed` outcome is delivered but not
    /// treated as final, so the next call retries the loader. Never returns
    /// an error: failures surface as `FetchFailed` values.
    pub async fn get(&self, key: &K) -> CacheEntry<V> {
        if let Some(entry) = self.get_if_present(key).await {
            if !entry.is_fetch_failed() {
                return entry;
            }
        }
        self.join_or_start_load(key).await.await
    }

    /// The cached entry for a key, without triggering a load.
    ///
    /// Expired slots are reported as absent.
    pub async fn get_if_present(&self, key: &K) -> Option<CacheEntry<V>> {
        let entries = self.inner.entries.read().await;
        entries
            .get(key)
            .filter(|slot| !self.inner.is_expired(slot))
            .map(|slot| slot.entry.clone())
    }

    /// Install an entry through the revision compare-and-set.
    ///
    /// Returns whether the entry was installed. Used by loaders and by
    /// revision-aware updates arriving from change events.
    pub async fn put(&self, key: K, entry: CacheEntry<V>) -> bool {
        self.inner.install(&key, entry).await
    }

    /// Remove the cached entry unconditionally.
    ///
    /// Does not cancel an in-flight load racing with the invalidation; if
    /// that load completes it installs its result, which is at least as
    /// fresh as what was evicted.
    pub async fn invalidate(&self, key: &K) {
        let removed = self.inner.entries.write().await.remove(key).is_some();
        trace!(removed, "cache entry invalidated");
    }

    /// Number of cached entries, including expired ones not yet reclaimed
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    /// Join the in-flight load for a key, starting one if none exists.
    async fn join_or_start_load(&self, key: &K) -> SharedLoad<V> {
        let mut in_flight = self.inner.in_flight.lock().await;
        if let Some(load) = in_flight.get(key) {
            return load.clone();
        }
        // re-check under the in-flight lock: a load may have completed and
        // installed its entry between our miss and acquiring the lock
        if let Some(slot) = self.inner.entries.read().await.get(key) {
            if !self.inner.is_expired(slot) && !slot.entry.is_fetch_failed() {
                let entry = slot.entry.clone();
                return async move { entry }.boxed().shared();
            }
        }

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let load_key = key.clone();
        tokio::spawn(async move {
            let entry = match inner.loader.load(&load_key).await {
                Ok(entry) => entry,
                Err(cause) => {
                    debug!(%cause, "cache loader failed");
                    CacheEntry::fetch_failed(cause)
                }
            };
            inner.install(&load_key, entry.clone()).await;
            inner.in_flight.lock().await.remove(&load_key);
            // waiters may all have gone away; that is fine
            let _ = tx.send(entry);
        });

        let load: SharedLoad<V> = rx
            .map(|result| {
                result.unwrap_or_else(|_| {
                    CacheEntry::fetch_failed(EffigyError::internal("cache load task dropped"))
                })
            })
            .boxed()
            .shared();
        in_flight.insert(key.clone(), load.clone());
        load
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn is_expired(&self, slot: &Slot<V>) -> bool {
        match self.config.ttl() {
            Some(ttl) => slot.written_at.elapsed() >= ttl,
            None => false,
        }
    }

    async fn install(&self, key: &K, entry: CacheEntry<V>) -> bool {
        let mut entries = self.entries.write().await;
        let admitted = {
            let current = entries
                .get(key)
                .filter(|slot| !self.is_expired(slot))
                .map(|slot| &slot.entry);
            entry.may_replace(current)
        };
        if !admitted {
            trace!("cache write rejected by revision compare-and-set");
            return false;
        }
        if !entries.contains_key(key) {
            self.evict_if_full(&mut entries);
        }
        entries.insert(
            key.clone(),
            Slot {
                entry,
                written_at: Instant::now(),
            },
        );
        true
    }

    /// Evict the oldest-written slot when the configured bound is reached.
    fn evict_if_full(&self, entries: &mut HashMap<K, Slot<V>>) {
        let Some(max) = self.config.max_entries else {
            return;
        };
        if entries.len() < max.max(1) {
            return;
        }
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, slot)| slot.written_at)
            .map(|(key, _)| key.clone())
        {
            entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Loader returning a scripted sequence of results, counting invocations
    /// and optionally holding each load until released.
    struct ScriptedLoader {
        results: Mutex<Vec<Result<CacheEntry<String>, EffigyError>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedLoader {
        fn new(results: Vec<Result<CacheEntry<String>, EffigyError>>) -> Self {
            Self {
                results: Mutex::new(results),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn gated(results: Vec<Result<CacheEntry<String>, EffigyError>>, gate: Arc<Notify>) -> Self {
            Self {
                results: Mutex::new(results),
                calls: AtomicUsize::new(0),
                gate: Some(gate),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CacheLoader<String, String> for ScriptedLoader {
        async fn load(&self, _key: &String) -> Result<CacheEntry<String>, EffigyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let mut results = self.results.lock().await;
            if results.is_empty() {
                Ok(CacheEntry::nonexistent())
            } else {
                results.remove(0)
            }
        }
    }

    fn cache_over(loader: Arc<ScriptedLoader>) -> LoadingCache<String, String> {
        LoadingCache::new(loader, CacheConfig::default())
    }

    #[tokio::test]
    async fn miss_loads_then_hits_without_reload() {
        let loader = Arc::new(ScriptedLoader::new(vec![Ok(CacheEntry::existent(
            3,
            "v1".into(),
        ))]));
        let cache = cache_over(loader.clone());

        let entry = cache.get(&"policy:a".to_string()).await;
        assert_eq!(entry, CacheEntry::existent(3, "v1".into()));
        let entry = cache.get(&"policy:a".to_string()).await;
        assert_eq!(entry, CacheEntry::existent(3, "v1".into()));
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_are_single_flight() {
        let gate = Arc::new(Notify::new());
        let loader = Arc::new(ScriptedLoader::gated(
            vec![Ok(CacheEntry::existent(1, "v".into()))],
            gate.clone(),
        ));
        let cache = cache_over(loader.clone());

        let mut waiters = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            waiters.push(tokio::spawn(
                async move { cache.get(&"k".to_string()).await },
            ));
        }
        // let every waiter reach the in-flight join before releasing the load
        tokio::task::yield_now().await;
        gate.notify_waiters();
        gate.notify_one();

        for waiter in waiters {
            let entry = waiter.await.unwrap();
            assert_eq!(entry, CacheEntry::existent(1, "v".into()));
        }
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn negative_entries_are_cached_until_invalidated() {
        let loader = Arc::new(ScriptedLoader::new(vec![
            Ok(CacheEntry::nonexistent()),
            Ok(CacheEntry::existent(1, "created".into())),
        ]));
        let cache = cache_over(loader.clone());
        let key = "policy:missing".to_string();

        assert_matches!(cache.get(&key).await, CacheEntry::Nonexistent { .. });
        assert_matches!(cache.get(&key).await, CacheEntry::Nonexistent { .. });
        assert_eq!(loader.calls(), 1);

        cache.invalidate(&key).await;
        assert_eq!(cache.get(&key).await, CacheEntry::existent(1, "created".into()));
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn fetch_failures_are_returned_but_retried() {
        let loader = Arc::new(ScriptedLoader::new(vec![
            Err(EffigyError::service_unavailable("owner down")),
            Ok(CacheEntry::existent(2, "recovered".into())),
        ]));
        let cache = cache_over(loader.clone());
        let key = "policy:flaky".to_string();

        let entry = cache.get(&key).await;
        assert_matches!(
            entry.cause(),
            Some(EffigyError::ServiceUnavailable { .. })
        );
        // next call retries the loader instead of reusing the failure
        assert_eq!(cache.get(&key).await, CacheEntry::existent(2, "recovered".into()));
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn put_applies_revision_compare_and_set() {
        let loader = Arc::new(ScriptedLoader::new(vec![]));
        let cache = cache_over(loader);
        let key = "policy:p".to_string();

        assert!(cache.put(key.clone(), CacheEntry::existent(5, "r5".into())).await);
        assert!(!cache.put(key.clone(), CacheEntry::existent(4, "r4".into())).await);
        assert!(!cache.put(key.clone(), CacheEntry::existent(5, "dup".into())).await);
        assert!(cache.put(key.clone(), CacheEntry::existent(6, "r6".into())).await);
        assert_eq!(
            cache.get_if_present(&key).await,
            Some(CacheEntry::existent(6, "r6".into()))
        );

        assert!(cache.put(key.clone(), CacheEntry::existent_permanent("pinned".into())).await);
        assert!(!cache.put(key.clone(), CacheEntry::existent(i64::MAX, "late".into())).await);
        assert_eq!(
            cache.get_if_present(&key).await,
            Some(CacheEntry::existent_permanent("pinned".into()))
        );
    }

    #[tokio::test]
    async fn load_racing_an_invalidation_still_installs() {
        let gate = Arc::new(Notify::new());
        let loader = Arc::new(ScriptedLoader::gated(
            vec![Ok(CacheEntry::existent(7, "late".into()))],
            gate.clone(),
        ));
        let cache = cache_over(loader.clone());
        let key = "policy:raced".to_string();

        let pending = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move { cache.get(&key).await })
        };
        tokio::task::yield_now().await;

        // the eviction removes old state only; the in-flight load survives
        cache.invalidate(&key).await;
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), CacheEntry::existent(7, "late".into()));
        assert_eq!(
            cache.get_if_present(&key).await,
            Some(CacheEntry::existent(7, "late".into()))
        );
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_reload() {
        let loader = Arc::new(ScriptedLoader::new(vec![
            Ok(CacheEntry::existent(1, "v1".into())),
            Ok(CacheEntry::existent(2, "v2".into())),
        ]));
        let cache = LoadingCache::new(
            loader.clone() as Arc<dyn CacheLoader<String, String>>,
            CacheConfig {
                max_entries: None,
                ttl_ms: Some(60_000),
            },
        );
        let key = "policy:ttl".to_string();

        assert_eq!(cache.get(&key).await, CacheEntry::existent(1, "v1".into()));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get(&key).await, CacheEntry::existent(2, "v2".into()));
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn size_bound_evicts_oldest_written() {
        let loader = Arc::new(ScriptedLoader::new(vec![]));
        let cache = LoadingCache::new(
            loader as Arc<dyn CacheLoader<String, String>>,
            CacheConfig {
                max_entries: Some(2),
                ttl_ms: None,
            },
        );

        assert!(cache.put("a".into(), CacheEntry::existent(1, "a".into())).await);
        assert!(cache.put("b".into(), CacheEntry::existent(1, "b".into())).await);
        assert!(cache.put("c".into(), CacheEntry::existent(1, "c".into())).await);

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get_if_present(&"a".to_string()).await, None);
        assert!(cache.get_if_present(&"c".to_string()).await.is_some());
    }
}
