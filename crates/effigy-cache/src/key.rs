//! Composite cache keys

use effigy_core::{EntityId, ResourceType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key: resource-type tag plus entity identifier
///
/// Equality and hashing are structural, so `policy:org.acme:p1` and
/// `thing:org.acme:p1` occupy distinct slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Resource type of the cached entity
    pub resource: ResourceType,
    /// Identifier of the cached entity
    pub id: EntityId,
}

impl CacheKey {
    /// Key for an arbitrary resource type
    pub fn new(resource: ResourceType, id: EntityId) -> Self {
        Self { resource, id }
    }

    /// Key for a policy's effective enforcer
    pub fn policy(id: EntityId) -> Self {
        Self::new(ResourceType::Policy, id)
    }

    /// Key for a thing entity
    pub fn thing(id: EntityId) -> Self {
        Self::new(ResourceType::Thing, id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.id)
    }
}
