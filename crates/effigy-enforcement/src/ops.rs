//! Per-command-family enforcement implementations
//!
//! Every protected command family supplies an [`EnforcementOps`]; the
//! registry maps family tags to implementations and is resolved once at
//! startup. Opting a family out of enforcement is an explicit, audit-logged
//! registration of [`UnenforcedPassthrough`]; an unknown family is an
//! error, never a silent pass.

use async_trait::async_trait;
use effigy_core::{
    EffectiveEnforcer, EffigyError, EffigyResult, Permission, Signal, SignalAction,
    SignalResponse,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Capability set implemented by each protected command family
#[async_trait]
pub trait EnforcementOps: Send + Sync + std::fmt::Debug {
    /// Authorize a signal against the entity's effective enforcer.
    ///
    /// Returns the (possibly header-enriched) signal for forwarding, or a
    /// permission-denied error.
    async fn authorize_signal(
        &self,
        signal: Signal,
        enforcer: &EffectiveEnforcer,
    ) -> EffigyResult<Signal>;

    /// Authorize a signal whose entity has no enforcer yet (freshly created
    /// entity, policy not in existence). Encodes the creation-time bootstrap
    /// rules.
    async fn authorize_signal_with_missing_enforcer(&self, signal: Signal)
        -> EffigyResult<Signal>;

    /// Whether this response needs field-level filtering before release
    fn should_filter_command_response(&self, response: &SignalResponse) -> bool;

    /// Strip fields the caller's authorization context may not read.
    ///
    /// Filtering an already-filtered response with the same enforcer yields
    /// an identical result.
    async fn filter_response(
        &self,
        response: SignalResponse,
        enforcer: &EffectiveEnforcer,
    ) -> EffigyResult<SignalResponse>;
}

/// Header marking a signal that passed authorization
const HEADER_AUTHORIZED: &str = "effigy-authorized";

/// Enforcement for the thing command family.
///
/// Retrieval needs the `read` permission, everything else `write`. Creation
/// of a brand-new thing is the one operation allowed without an enforcer;
/// any other action on a policy-less entity is denied as not-accessible so
/// callers cannot probe for existence.
#[derive(Debug, Default)]
pub struct ThingEnforcement;

impl ThingEnforcement {
    fn required_permission(action: SignalAction) -> Permission {
        match action {
            SignalAction::Retrieve => Permission::Read,
            SignalAction::Create | SignalAction::Modify | SignalAction::Delete => {
                Permission::Write
            }
        }
    }
}

#[async_trait]
impl EnforcementOps for ThingEnforcement {
    async fn authorize_signal(
        &self,
        signal: Signal,
        enforcer: &EffectiveEnforcer,
    ) -> EffigyResult<Signal> {
        let permission = Self::required_permission(signal.action);
        if enforcer.has_permission(signal.subjects(), permission) {
            Ok(signal.with_header(HEADER_AUTHORIZED, "thing"))
        } else {
            debug!(entity = %signal.entity, ?permission, "thing signal denied");
            Err(EffigyError::permission_denied(format!(
                "none of the subjects may {:?} thing {}",
                permission, signal.entity
            )))
        }
    }

    async fn authorize_signal_with_missing_enforcer(
        &self,
        signal: Signal,
    ) -> EffigyResult<Signal> {
        match signal.action {
            SignalAction::Create => Ok(signal.with_header(HEADER_AUTHORIZED, "thing-create")),
            _ => Err(EffigyError::not_accessible(format!(
                "thing {} does not exist or the caller may not access it",
                signal.entity
            ))),
        }
    }

    fn should_filter_command_response(&self, response: &SignalResponse) -> bool {
        response.payload.is_object()
    }

    async fn filter_response(
        &self,
        mut response: SignalResponse,
        enforcer: &EffectiveEnforcer,
    ) -> EffigyResult<SignalResponse> {
        let subjects = response.headers.auth.subjects.clone();
        if enforcer.grants_read(&subjects, "/") {
            return Ok(response);
        }
        response.payload = filter_value(&response.payload, enforcer, &subjects, "")
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(response)
    }
}

/// Keep the subtrees the enforcer grants; keep ancestors only while they
/// still carry a readable descendant.
fn filter_value(
    value: &Value,
    enforcer: &EffectiveEnforcer,
    subjects: &[String],
    path: &str,
) -> Option<Value> {
    if !path.is_empty() && enforcer.grants_read(subjects, path) {
        return Some(value.clone());
    }
    match value {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .iter()
                .filter_map(|(key, child)| {
                    let child_path = format!("{path}/{key}");
                    filter_value(child, enforcer, subjects, &child_path)
                        .map(|filtered| (key.clone(), filtered))
                })
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Value::Object(kept))
            }
        }
        _ => None,
    }
}

/// Enforcement for the policy command family.
///
/// Every operation on a policy requires the `admin` permission of that
/// policy's own enforcer; policy responses are released without field
/// filtering.
#[derive(Debug, Default)]
pub struct PolicyEnforcement;

#[async_trait]
impl EnforcementOps for PolicyEnforcement {
    async fn authorize_signal(
        &self,
        signal: Signal,
        enforcer: &EffectiveEnforcer,
    ) -> EffigyResult<Signal> {
        if enforcer.has_permission(signal.subjects(), Permission::Admin) {
            Ok(signal.with_header(HEADER_AUTHORIZED, "policy"))
        } else {
            debug!(entity = %signal.entity, "policy signal denied");
            Err(EffigyError::permission_denied(format!(
                "none of the subjects may administer policy {}",
                signal.entity
            )))
        }
    }

    async fn authorize_signal_with_missing_enforcer(
        &self,
        signal: Signal,
    ) -> EffigyResult<Signal> {
        // creating a policy bootstraps its own enforcer
        match signal.action {
            SignalAction::Create => Ok(signal.with_header(HEADER_AUTHORIZED, "policy-create")),
            _ => Err(EffigyError::not_accessible(format!(
                "policy {} does not exist or the caller may not access it",
                signal.entity
            ))),
        }
    }

    fn should_filter_command_response(&self, _response: &SignalResponse) -> bool {
        false
    }

    async fn filter_response(
        &self,
        response: SignalResponse,
        _enforcer: &EffectiveEnforcer,
    ) -> EffigyResult<SignalResponse> {
        Ok(response)
    }
}

/// Explicit opt-out of enforcement: everything passes through unauthorized.
///
/// Registered only through
/// [`EnforcementRegistry::register_unenforced`], which leaves an audit trail
/// in the logs.
#[derive(Debug, Default)]
pub struct UnenforcedPassthrough;

#[async_trait]
impl EnforcementOps for UnenforcedPassthrough {
    async fn authorize_signal(
        &self,
        signal: Signal,
        _enforcer: &EffectiveEnforcer,
    ) -> EffigyResult<Signal> {
        Ok(signal)
    }

    async fn authorize_signal_with_missing_enforcer(
        &self,
        signal: Signal,
    ) -> EffigyResult<Signal> {
        Ok(signal)
    }

    fn should_filter_command_response(&self, _response: &SignalResponse) -> bool {
        false
    }

    async fn filter_response(
        &self,
        response: SignalResponse,
        _enforcer: &EffectiveEnforcer,
    ) -> EffigyResult<SignalResponse> {
        Ok(response)
    }
}

/// Family tag -> enforcement implementation, resolved once at startup
#[derive(Default)]
pub struct EnforcementRegistry {
    ops: HashMap<String, Arc<dyn EnforcementOps>>,
}

impl EnforcementRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the enforcement implementation for a family.
    ///
    /// Registering a family twice is a configuration error.
    pub fn register(
        &mut self,
        family: impl Into<String>,
        ops: Arc<dyn EnforcementOps>,
    ) -> EffigyResult<()> {
        let family = family.into();
        if self.ops.contains_key(&family) {
            return Err(EffigyError::invalid(format!(
                "enforcement already registered for family {family}"
            )));
        }
        self.ops.insert(family, ops);
        Ok(())
    }

    /// Register an explicit enforcement opt-out for a family
    pub fn register_unenforced(&mut self, family: impl Into<String>) -> EffigyResult<()> {
        let family = family.into();
        warn!(%family, "command family registered WITHOUT enforcement");
        self.register(family, Arc::new(UnenforcedPassthrough))
    }

    /// Resolve the implementation for a family; unknown families are an
    /// error, never a silent pass
    pub fn resolve(&self, family: &str) -> EffigyResult<Arc<dyn EnforcementOps>> {
        self.ops.get(family).cloned().ok_or_else(|| {
            EffigyError::invalid(format!("no enforcement registered for family {family}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use effigy_core::{AuthContext, EntityId, ResourceType, SignalStatus};
    use serde_json::json;

    fn thing_signal(action: SignalAction, subjects: &[&str]) -> Signal {
        Signal::new(
            "things",
            ResourceType::Thing,
            EntityId::parse("org.acme:device-1").unwrap(),
            action,
            AuthContext::new(subjects.iter().copied()),
        )
    }

    fn enforcer() -> EffectiveEnforcer {
        EffectiveEnforcer::new()
            .grant("iot:alice", Permission::Read)
            .grant("iot:alice", Permission::Write)
            .grant("iot:bob", Permission::Read)
            .grant_read_path("iot:alice", "/")
            .grant_read_path("iot:bob", "/attributes/public")
    }

    #[tokio::test]
    async fn write_requires_write_permission() {
        let ops = ThingEnforcement;
        let granted = ops
            .authorize_signal(thing_signal(SignalAction::Modify, &["iot:alice"]), &enforcer())
            .await
            .unwrap();
        assert_eq!(
            granted.headers.extra.get(HEADER_AUTHORIZED).map(String::as_str),
            Some("thing")
        );

        assert_matches!(
            ops.authorize_signal(thing_signal(SignalAction::Modify, &["iot:bob"]), &enforcer())
                .await,
            Err(EffigyError::PermissionDenied { .. })
        );
    }

    #[tokio::test]
    async fn missing_enforcer_allows_only_creation() {
        let ops = ThingEnforcement;
        assert!(ops
            .authorize_signal_with_missing_enforcer(thing_signal(
                SignalAction::Create,
                &["iot:carol"]
            ))
            .await
            .is_ok());
        // not-accessible, not permission-denied: existence must not leak
        assert_matches!(
            ops.authorize_signal_with_missing_enforcer(thing_signal(
                SignalAction::Retrieve,
                &["iot:carol"]
            ))
            .await,
            Err(EffigyError::NotAccessible { .. })
        );
    }

    fn thing_response(subjects: &[&str], payload: Value) -> SignalResponse {
        SignalResponse::to_signal(
            &thing_signal(SignalAction::Retrieve, subjects),
            SignalStatus::Ok,
            payload,
        )
    }

    #[tokio::test]
    async fn filtering_redacts_unreadable_fields() {
        let ops = ThingEnforcement;
        let payload = json!({
            "thingId": "org.acme:device-1",
            "attributes": {
                "public": { "label": "pump-7" },
                "secret": { "apiKey": "xyz" }
            }
        });
        let response = thing_response(&["iot:bob"], payload);
        assert!(ops.should_filter_command_response(&response));

        let filtered = ops.filter_response(response, &enforcer()).await.unwrap();
        assert_eq!(
            filtered.payload,
            json!({ "attributes": { "public": { "label": "pump-7" } } })
        );
    }

    #[tokio::test]
    async fn filtering_is_idempotent() {
        let ops = ThingEnforcement;
        let response = thing_response(
            &["iot:bob"],
            json!({
                "attributes": {
                    "public": { "label": "pump-7" },
                    "secret": true
                }
            }),
        );
        let once = ops.filter_response(response, &enforcer()).await.unwrap();
        let twice = ops.filter_response(once.clone(), &enforcer()).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn full_read_grant_passes_payload_unchanged() {
        let ops = ThingEnforcement;
        let payload = json!({ "attributes": { "secret": true } });
        let response = thing_response(&["iot:alice"], payload.clone());
        let filtered = ops.filter_response(response, &enforcer()).await.unwrap();
        assert_eq!(filtered.payload, payload);
    }

    #[tokio::test]
    async fn policy_family_requires_admin() {
        let ops = PolicyEnforcement;
        let enforcer = EffectiveEnforcer::new().grant("iot:root", Permission::Admin);
        let signal = Signal::new(
            "policies",
            ResourceType::Policy,
            EntityId::parse("org.acme:p1").unwrap(),
            SignalAction::Modify,
            AuthContext::new(["iot:root"]),
        );
        assert!(ops.authorize_signal(signal.clone(), &enforcer).await.is_ok());

        let outsider = Signal {
            headers: effigy_core::SignalHeaders::new(AuthContext::new(["iot:alice"])),
            ..signal
        };
        assert_matches!(
            ops.authorize_signal(outsider, &enforcer).await,
            Err(EffigyError::PermissionDenied { .. })
        );
    }

    #[test]
    fn registry_rejects_duplicates_and_unknown_families() {
        let mut registry = EnforcementRegistry::new();
        registry.register("things", Arc::new(ThingEnforcement)).unwrap();
        assert_matches!(
            registry.register("things", Arc::new(ThingEnforcement)),
            Err(EffigyError::Invalid { .. })
        );
        assert_matches!(registry.resolve("unknown"), Err(EffigyError::Invalid { .. }));
        assert!(registry.resolve("things").is_ok());
    }

    #[tokio::test]
    async fn opt_out_is_explicit_and_passes_everything() {
        let mut registry = EnforcementRegistry::new();
        registry.register_unenforced("diagnostics").unwrap();
        let ops = registry.resolve("diagnostics").unwrap();
        let signal = thing_signal(SignalAction::Delete, &["nobody"]);
        assert!(ops
            .authorize_signal_with_missing_enforcer(signal)
            .await
            .is_ok());
    }
}
