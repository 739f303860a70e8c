//! Request/response protocol toward remote policy owners
//!
//! The owner of a policy is an external collaborator reached only by message
//! exchange. The response taxonomy is declared here so the loader can
//! classify outcomes for the retry loop: `NotFound` is terminal,
//! `Unavailable` is transient.

use async_trait::async_trait;
use effigy_core::{EffectiveEnforcer, EffigyError, EntityId};
use effigy_retry::MessageTarget;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request the effective enforcer for one policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcerRequest {
    /// The policy to resolve
    pub policy_id: EntityId,
}

/// Owner's answer to an [`EnforcerRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnforcerResponse {
    /// The policy exists; its resolved enforcer at the given revision
    Found {
        /// Revision of the policy the enforcer was resolved from
        revision: i64,
        /// The resolved permission table
        enforcer: EffectiveEnforcer,
    },
    /// The policy does not exist (terminal; cached as a negative entry)
    NotFound,
    /// The owner cannot answer right now (transient; retried)
    Unavailable {
        /// Owner-supplied reason, for logs
        reason: String,
    },
}

/// Resolves the current location of a policy's owner.
///
/// Re-invoked before every ask attempt; the owning shard may move between
/// attempts after a rebalance.
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    /// Resolve the target to ask for enforcers right now
    async fn resolve(
        &self,
    ) -> Result<Arc<dyn MessageTarget<EnforcerRequest, EnforcerResponse>>, EffigyError>;
}
