//! Core identifier types used across the Effigy enforcement core
//!
//! Entity identifiers are `namespace:name` strings; the namespace portion is
//! what the replicated blocklist is keyed on, so parsing rejects ids without
//! one up front rather than letting a blank namespace slip past the gate.

use crate::errors::EffigyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource-type tag for protected entities
///
/// Forms the first component of a cache key and selects the enforcement
/// implementation for a signal family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Access-control policy entity
    Policy,
    /// Digital-twin ("thing") entity
    Thing,
    /// Connectivity-management entity
    Connectivity,
}

impl ResourceType {
    /// Stable string tag, used in cache keys and change notifications
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Thing => "thing",
            Self::Connectivity => "connectivity",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = EffigyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "policy" => Ok(Self::Policy),
            "thing" => Ok(Self::Thing),
            "connectivity" => Ok(Self::Connectivity),
            other => Err(EffigyError::invalid(format!(
                "unknown resource type: {other}"
            ))),
        }
    }
}

/// Identifier of a protected entity in `namespace:name` form
///
/// Equality and hashing are structural over the full string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Parse an entity id, requiring a non-empty namespace and name
    pub fn parse(id: impl Into<String>) -> Result<Self, EffigyError> {
        let id = id.into();
        match id.split_once(':') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => Ok(Self(id)),
            _ => Err(EffigyError::invalid(format!(
                "entity id must have the form namespace:name, got: {id}"
            ))),
        }
    }

    /// The namespace portion of the id
    pub fn namespace(&self) -> &str {
        // parse() guaranteed the separator exists
        self.0.split_once(':').map(|(ns, _)| ns).unwrap_or("")
    }

    /// The name portion of the id
    pub fn name(&self) -> &str {
        self.0.split_once(':').map(|(_, name)| name).unwrap_or("")
    }

    /// The full `namespace:name` string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = EffigyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn entity_id_parses_namespace_and_name() {
        let id = EntityId::parse("org.acme:device-1").unwrap();
        assert_eq!(id.namespace(), "org.acme");
        assert_eq!(id.name(), "device-1");
        assert_eq!(id.as_str(), "org.acme:device-1");
    }

    #[test]
    fn entity_id_rejects_missing_namespace() {
        assert_matches!(EntityId::parse("device-1"), Err(EffigyError::Invalid { .. }));
        assert_matches!(EntityId::parse(":device-1"), Err(EffigyError::Invalid { .. }));
        assert_matches!(EntityId::parse("org.acme:"), Err(EffigyError::Invalid { .. }));
    }

    #[test]
    fn resource_type_round_trips_through_tag() {
        for rt in [
            ResourceType::Policy,
            ResourceType::Thing,
            ResourceType::Connectivity,
        ] {
            assert_eq!(rt.as_str().parse::<ResourceType>().unwrap(), rt);
        }
    }
}
