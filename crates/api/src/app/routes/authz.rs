//! Authorization endpoints: policy checks and audit views.
//!
//! These answer "would this request be allowed, and why?" for the caller.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use keygate_auth::{explain, Decision, PolicyRegistry};

use crate::context::PrincipalContext;

#[derive(Debug, Serialize)]
pub struct PolicyCheck {
    pub policy: String,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct PolicyInfo {
    pub name: String,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RoleInfo {
    pub role: String,
    pub permissions: Vec<String>,
}

/// GET /authz/check/:policy - evaluate a named policy for the caller
pub async fn check_policy(
    Extension(registry): Extension<Arc<PolicyRegistry>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(policy): Path<String>,
) -> impl IntoResponse {
    let decision = registry.evaluate(&policy, principal.principal());
    Json(PolicyCheck {
        allowed: decision == Decision::Allow,
        policy,
    })
}

/// GET /authz/explain/:policy - detailed explanation of a decision for the caller
pub async fn explain_policy(
    Extension(registry): Extension<Arc<PolicyRegistry>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(policy): Path<String>,
) -> impl IntoResponse {
    Json(explain(&registry, &policy, principal.principal()))
}

/// GET /authz/policies - registered policy names
pub async fn list_policies(Extension(registry): Extension<Arc<PolicyRegistry>>) -> impl IntoResponse {
    let policies: Vec<PolicyInfo> = registry
        .names()
        .filter_map(|name| {
            registry.get(name).map(|policy| PolicyInfo {
                name: name.to_string(),
                kind: policy.kind(),
            })
        })
        .collect();

    Json(serde_json::json!({ "policies": policies }))
}

/// GET /authz/roles - the role → permission table
pub async fn list_roles(Extension(registry): Extension<Arc<PolicyRegistry>>) -> impl IntoResponse {
    let roles: Vec<RoleInfo> = registry
        .permissions()
        .roles()
        .map(|(role, perms)| RoleInfo {
            role: role.as_str().to_string(),
            permissions: perms.iter().map(|p| p.as_str().to_string()).collect(),
        })
        .collect();

    Json(serde_json::json!({ "roles": roles }))
}
