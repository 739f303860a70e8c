//! Loader seam plugged into the loading cache

use crate::entry::CacheEntry;
use async_trait::async_trait;
use effigy_core::EffigyError;

/// Asynchronous loader invoked on cache misses
///
/// Implementations resolve the remote owner of the keyed entity and return an
/// authoritative entry: `Existent` at the owner's revision, or `Nonexistent`
/// when the owner confirms absence. Transport failures and exhausted retries
/// are returned as `Err`; the cache converts them into `FetchFailed` entries
/// so a loader failure never corrupts cache state.
#[async_trait]
pub trait CacheLoader<K, V>: Send + Sync {
    /// Load the value for one key from its remote owner
    async fn load(&self, key: &K) -> Result<CacheEntry<V>, EffigyError>;
}
