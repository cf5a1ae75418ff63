// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

use serde::Serialize;

use crate::permissions::ExplicitPermissions;
use crate::policy::{Decision, DenyReason, Policy, PolicyRegistry};
use crate::{Permission, Principal, PrincipalId};

/// Detailed explanation of an authorization decision.
///
/// This structure provides transparent, debuggable information about why
/// a request was allowed or denied.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    /// The policy that was evaluated.
    pub policy: String,

    /// Policy kind ("roles", "permission", "assertion"), if registered.
    pub policy_kind: Option<&'static str>,

    /// Whether the authorization was granted.
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Details about the principal's state.
    pub principal: PrincipalState,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

/// Current state of the principal being checked.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub subject: PrincipalId,
    pub roles: Vec<String>,
    pub derived_permissions: Vec<String>,
    pub explicit_permissions: Vec<String>,
    /// The explicit permission claim was present but not a list of strings.
    pub explicit_claim_unparseable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    #[serde(flatten)]
    pub kind: DenyReason,
    pub message: String,
    pub suggestions: Vec<String>,
}

/// Explain why an authorization decision was made (or would be made).
///
/// The `granted` flag always agrees with [`PolicyRegistry::evaluate`].
pub fn explain(registry: &PolicyRegistry, policy: &str, principal: &Principal) -> AuthorizationExplanation {
    let decision = registry.evaluate(policy, principal);
    let state = principal_state(registry, principal);
    let policy_kind = registry.get(policy).map(Policy::kind);

    match decision {
        Decision::Allow => AuthorizationExplanation {
            policy: policy.to_string(),
            policy_kind,
            granted: true,
            reason: grant_reason(registry, policy, principal),
            principal: state,
            denial_reason: None,
        },
        Decision::Deny(kind) => {
            let message = kind.to_string();
            let suggestions = suggestions(registry, &kind);
            AuthorizationExplanation {
                policy: policy.to_string(),
                policy_kind,
                granted: false,
                reason: format!("Policy '{policy}' denied: {message}"),
                principal: state,
                denial_reason: Some(DenialReason {
                    kind,
                    message,
                    suggestions,
                }),
            }
        }
    }
}

fn principal_state(registry: &PolicyRegistry, principal: &Principal) -> PrincipalState {
    let explicit = registry.explicit_permissions(principal);
    PrincipalState {
        subject: principal.subject.clone(),
        roles: principal.roles.to_strings(),
        derived_permissions: registry
            .permissions()
            .derive(&principal.roles)
            .iter()
            .map(|p| p.as_str().to_string())
            .collect(),
        explicit_permissions: explicit.listed(),
        explicit_claim_unparseable: explicit == ExplicitPermissions::Unparseable,
    }
}

fn grant_reason(registry: &PolicyRegistry, policy: &str, principal: &Principal) -> String {
    match registry.get(policy) {
        Some(Policy::Roles(accepted)) => {
            let held: Vec<String> = accepted
                .iter()
                .filter(|role| principal.roles.contains(role.as_str()))
                .map(|role| role.as_str().to_string())
                .collect();
            format!("Principal holds accepted role(s) {held:?}")
        }
        Some(Policy::Permission(required)) => {
            if registry.explicit_permissions(principal).contains(required) {
                format!("Token explicitly grants permission '{required}'")
            } else {
                format!("Permission '{required}' is derived from the principal's roles")
            }
        }
        Some(Policy::Assertion(_)) => "Assertion accepted the principal".to_string(),
        None => String::new(),
    }
}

fn suggestions(registry: &PolicyRegistry, reason: &DenyReason) -> Vec<String> {
    match reason {
        DenyReason::MissingRole { accepted } => {
            vec![format!("Assign one of the roles {accepted:?} in the identity provider")]
        }
        DenyReason::MissingPermission { permission } => {
            let granting: Vec<String> = registry
                .permissions()
                .roles_granting(&Permission::new(permission.clone()))
                .into_iter()
                .map(|r| r.as_str().to_string())
                .collect();

            let mut out = Vec::new();
            if !granting.is_empty() {
                out.push(format!("Assign a role that grants '{permission}': {granting:?}"));
            }
            out.push(format!(
                "Issue the token with '{permission}' in the '{}' claim",
                registry.permission_claim()
            ));
            out
        }
        DenyReason::AssertionRejected => Vec::new(),
        DenyReason::AssertionFailed { .. } => {
            vec!["The assertion errored; check server logs for the failure".to_string()]
        }
        DenyReason::UnknownPolicy { .. } => {
            let known: Vec<&str> = registry.names().collect();
            vec![format!("Registered policies: {known:?}")]
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::claims::{normalize, RawClaims};
    use crate::policy::names;
    use crate::RolePermissions;
    use serde_json::json;

    fn registry() -> PolicyRegistry {
        PolicyRegistry::standard(Arc::new(RolePermissions::standard()))
            .build()
            .unwrap()
    }

    fn principal(value: serde_json::Value) -> Principal {
        let raw: RawClaims = serde_json::from_value(value).unwrap();
        normalize(raw).unwrap()
    }

    #[test]
    fn explanation_agrees_with_evaluation() {
        let registry = registry();
        let p = principal(json!({ "sub": "u-1", "realm_access": { "roles": ["editor"] } }));

        for name in registry.names().chain(["Missing"]) {
            let explanation = explain(&registry, name, &p);
            assert_eq!(explanation.granted, registry.is_allowed(name, &p), "policy {name}");
        }
    }

    #[test]
    fn missing_permission_suggests_granting_roles() {
        let registry = registry();
        let p = principal(json!({
            "sub": "u-1",
            "realm_access": { "roles": ["user"] },
            "permissions": "delete"
        }));

        let explanation = explain(&registry, names::CAN_DELETE, &p);
        assert!(!explanation.granted);
        assert!(explanation.principal.explicit_claim_unparseable);
        assert_eq!(explanation.principal.derived_permissions, vec!["read"]);

        let denial = explanation.denial_reason.unwrap();
        assert_eq!(denial.kind, DenyReason::MissingPermission { permission: "delete".into() });
        assert!(denial.suggestions[0].contains("admin"));
    }

    #[test]
    fn explicit_grant_is_reported() {
        let p = principal(json!({ "sub": "svc", "permissions": ["manage"] }));

        let explanation = explain(&registry(), names::CAN_MANAGE, &p);
        assert!(explanation.granted);
        assert_eq!(explanation.policy_kind, Some("permission"));
        assert!(explanation.reason.contains("explicitly"));
        assert_eq!(explanation.principal.explicit_permissions, vec!["manage"]);
    }

    #[test]
    fn explanation_serializes_denial_kind() {
        let p = principal(json!({ "sub": "u-1" }));
        let explanation = explain(&registry(), names::ADMIN_ONLY, &p);

        let value = serde_json::to_value(&explanation).unwrap();
        assert_eq!(value["denial_reason"]["kind"], "missing_role");
        assert_eq!(value["denial_reason"]["accepted"], json!(["admin"]));
        assert_eq!(value["granted"], false);
    }
}
