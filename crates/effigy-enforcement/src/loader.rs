//! Cache loader asking remote policy owners for effective enforcers

use crate::protocol::{EnforcerRequest, EnforcerResponse, OwnerResolver};
use async_trait::async_trait;
use effigy_cache::{CacheEntry, CacheKey, CacheLoader};
use effigy_core::{AskConfig, EffectiveEnforcer, EffigyError};
use effigy_retry::{ask_with_retry, AskVerdict};
use std::sync::Arc;
use tracing::debug;

/// Loader plugged into the enforcer cache.
///
/// On each miss it asks the policy's current owner through the retry
/// protocol and maps the answer into a cache entry: `Found` becomes an
/// existent entry at the owner's revision, `NotFound` a negative entry, and
/// a transport failure or exhausted retry is returned as an error so the
/// cache installs a non-final `FetchFailed`.
pub struct EnforcerLoader {
    resolver: Arc<dyn OwnerResolver>,
    config: AskConfig,
}

impl EnforcerLoader {
    /// Create a loader asking through the given resolver
    pub fn new(resolver: Arc<dyn OwnerResolver>, config: AskConfig) -> Self {
        Self { resolver, config }
    }
}

/// `Unavailable` responses and transient transport errors are retried;
/// `Found`, `NotFound`, and terminal errors complete the ask.
fn classify(outcome: &Result<EnforcerResponse, EffigyError>) -> AskVerdict {
    match outcome {
        Ok(EnforcerResponse::Unavailable { .. }) => AskVerdict::RetryTransient,
        Ok(_) => AskVerdict::Complete,
        Err(err) if err.is_transient() => AskVerdict::RetryTransient,
        Err(_) => AskVerdict::Complete,
    }
}

#[async_trait]
impl CacheLoader<CacheKey, EffectiveEnforcer> for EnforcerLoader {
    async fn load(&self, key: &CacheKey) -> Result<CacheEntry<EffectiveEnforcer>, EffigyError> {
        let request = EnforcerRequest {
            policy_id: key.id.clone(),
        };
        let resolver = Arc::clone(&self.resolver);
        let response = ask_with_retry(
            move || {
                let resolver = Arc::clone(&resolver);
                async move { resolver.resolve().await }
            },
            request,
            &self.config,
            classify,
        )
        .await?;

        Ok(match response {
            EnforcerResponse::Found { revision, enforcer } => {
                debug!(key = %key, revision, "enforcer loaded");
                CacheEntry::existent(revision, enforcer)
            }
            EnforcerResponse::NotFound => {
                debug!(key = %key, "policy confirmed absent");
                CacheEntry::nonexistent()
            }
            // the retry loop never completes with an Unavailable answer, but
            // the mapping must stay total
            EnforcerResponse::Unavailable { reason } => {
                return Err(EffigyError::service_unavailable(reason))
            }
        })
    }
}
