//! Command and response envelopes processed by the enforcement gate
//!
//! A [`Signal`] is the internal representation of one inbound command after
//! protocol adaptation (MQTT/AMQP/HTTP adapters live outside this core). The
//! gate never looks inside the JSON payload except to filter responses; the
//! envelope carries everything authorization needs.

use crate::identifiers::{EntityId, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Action requested by a signal, mapped to a permission by each
/// enforcement implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    /// Create a new entity
    Create,
    /// Modify an existing entity
    Modify,
    /// Retrieve entity state
    Retrieve,
    /// Delete an entity
    Delete,
}

/// Authorization subjects resolved for the caller by the authentication layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Subject identifiers, e.g. `iot:alice` or `integration:bridge-7`
    pub subjects: Vec<String>,
}

impl AuthContext {
    /// Build an auth context from subject identifiers
    pub fn new<S: Into<String>>(subjects: impl IntoIterator<Item = S>) -> Self {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }
}

/// Envelope headers shared by signals and their responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalHeaders {
    /// Correlates a response with the signal that produced it
    pub correlation_id: Uuid,
    /// Caller's authorization subjects
    pub auth: AuthContext,
    /// Pass-through metadata (channel, reply-to, content-type, ...)
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SignalHeaders {
    /// Fresh headers for the given auth context
    pub fn new(auth: AuthContext) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            auth,
            extra: BTreeMap::new(),
        }
    }
}

/// One inbound command to a protected entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Command-family tag selecting the enforcement implementation
    pub family: String,
    /// Resource type of the target entity
    pub resource: ResourceType,
    /// Target entity
    pub entity: EntityId,
    /// Requested action
    pub action: SignalAction,
    /// Envelope headers
    pub headers: SignalHeaders,
    /// Command payload, opaque to the gate
    pub payload: Value,
}

impl Signal {
    /// Construct a signal with empty payload and fresh headers
    pub fn new(
        family: impl Into<String>,
        resource: ResourceType,
        entity: EntityId,
        action: SignalAction,
        auth: AuthContext,
    ) -> Self {
        Self {
            family: family.into(),
            resource,
            entity,
            action,
            headers: SignalHeaders::new(auth),
            payload: Value::Null,
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a pass-through header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.extra.insert(key.into(), value.into());
        self
    }

    /// Namespace of the target entity
    pub fn namespace(&self) -> &str {
        self.entity.namespace()
    }

    /// The caller's authorization subjects
    pub fn subjects(&self) -> &[String] {
        &self.headers.auth.subjects
    }
}

/// Outcome status of a forwarded signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    /// Entity state returned or modified
    Ok,
    /// Entity created
    Created,
    /// Entity deleted
    Deleted,
}

/// Response produced by the target of a forwarded signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalResponse {
    /// Outcome status
    pub status: SignalStatus,
    /// Entity the response concerns
    pub entity: EntityId,
    /// Headers copied from the originating signal by the forwarder
    pub headers: SignalHeaders,
    /// Response payload; subject to field-level filtering
    pub payload: Value,
}

impl SignalResponse {
    /// Build a response echoing the headers of the originating signal
    pub fn to_signal(signal: &Signal, status: SignalStatus, payload: Value) -> Self {
        Self {
            status,
            entity: signal.entity.clone(),
            headers: signal.headers.clone(),
            payload,
        }
    }

    /// The subjects of the caller the response is being released to
    pub fn subjects(&self) -> &[String] {
        &self.headers.auth.subjects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_echoes_signal_headers() {
        let signal = Signal::new(
            "things",
            ResourceType::Thing,
            EntityId::parse("org.acme:device-1").unwrap(),
            SignalAction::Retrieve,
            AuthContext::new(["iot:alice"]),
        );
        let response =
            SignalResponse::to_signal(&signal, SignalStatus::Ok, json!({"thingId": "x"}));
        assert_eq!(response.headers.correlation_id, signal.headers.correlation_id);
        assert_eq!(response.subjects(), signal.subjects());
        assert_eq!(response.entity, signal.entity);
    }

    #[test]
    fn namespace_comes_from_entity_id() {
        let signal = Signal::new(
            "things",
            ResourceType::Thing,
            EntityId::parse("org.acme:device-1").unwrap(),
            SignalAction::Create,
            AuthContext::default(),
        );
        assert_eq!(signal.namespace(), "org.acme");
    }
}
