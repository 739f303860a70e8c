//! The enforcement gate
//!
//! Single choke point for every protected signal. Order matters: the
//! blocklist is consulted before any cache or remote work, so a blocked
//! namespace costs one local set lookup and nothing else.

use crate::ops::EnforcementRegistry;
use async_trait::async_trait;
use effigy_cache::{CacheEntry, CacheKey, LoadingCache};
use effigy_core::{EffectiveEnforcer, EffigyError, EffigyResult, Signal, SignalResponse};
use effigy_replication::NamespaceBlocklist;
use std::sync::Arc;
use tracing::{debug, trace};

/// Delivers an authorized signal to its target and returns the response.
///
/// The target is an external collaborator (the entity's persistence layer
/// or another service); the gate only cares that exactly the authorized
/// signal goes out and the raw response comes back for filtering.
#[async_trait]
pub trait SignalForwarder: Send + Sync {
    /// Forward an authorized signal
    async fn forward(&self, signal: Signal) -> EffigyResult<SignalResponse>;
}

/// Authorization enforcement gate
///
/// Constructed once at service start with its collaborators injected and
/// shared by reference for the process lifetime.
pub struct EnforcementGate {
    blocklist: NamespaceBlocklist,
    cache: LoadingCache<CacheKey, EffectiveEnforcer>,
    registry: Arc<EnforcementRegistry>,
    forwarder: Arc<dyn SignalForwarder>,
}

impl EnforcementGate {
    /// Assemble the gate from its collaborators
    pub fn new(
        blocklist: NamespaceBlocklist,
        cache: LoadingCache<CacheKey, EffectiveEnforcer>,
        registry: Arc<EnforcementRegistry>,
        forwarder: Arc<dyn SignalForwarder>,
    ) -> Self {
        Self {
            blocklist,
            cache,
            registry,
            forwarder,
        }
    }

    /// Run one signal through the full pipeline: blocklist, enforcer cache,
    /// authorization, forwarding, response filtering.
    pub async fn process(&self, signal: Signal) -> EffigyResult<SignalResponse> {
        let namespace = signal.namespace().to_string();
        if self.blocklist.contains(&namespace).await {
            debug!(%namespace, "signal rejected, namespace blocked");
            return Err(EffigyError::namespace_blocked(namespace));
        }

        let ops = self.registry.resolve(&signal.family)?;
        // the entity's policy shares its id; resolving an explicit policy-id
        // indirection is the upstream entity service's concern
        let key = CacheKey::policy(signal.entity.clone());
        match self.cache.get(&key).await {
            CacheEntry::Existent {
                value: enforcer, ..
            } => {
                let authorized = ops.authorize_signal(signal, &enforcer).await?;
                trace!(entity = %authorized.entity, "signal authorized, forwarding");
                let response = self.forwarder.forward(authorized).await?;
                if ops.should_filter_command_response(&response) {
                    ops.filter_response(response, &enforcer).await
                } else {
                    Ok(response)
                }
            }
            CacheEntry::Nonexistent { .. } => {
                // creation bootstrap; denials surface as not-accessible so
                // callers cannot distinguish "absent" from "forbidden"
                let authorized = ops.authorize_signal_with_missing_enforcer(signal).await?;
                trace!(entity = %authorized.entity, "bootstrap signal authorized, forwarding");
                self.forwarder.forward(authorized).await
            }
            CacheEntry::FetchFailed { cause } => {
                debug!(%cause, key = %key, "enforcer unavailable");
                Err(EffigyError::service_unavailable(format!(
                    "enforcer for {key} could not be fetched: {cause}"
                )))
            }
        }
    }
}
