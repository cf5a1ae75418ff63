use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use keygate_auth::{explicit_permissions, PolicyRegistry};

use crate::context::PrincipalContext;

/// GET /me - the caller's identity, normalized roles and effective permissions
pub async fn whoami(
    Extension(registry): Extension<Arc<PolicyRegistry>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let p = principal.principal();

    let mut permissions: BTreeSet<String> = registry
        .permissions()
        .derive(principal.roles())
        .iter()
        .map(|perm| perm.as_str().to_string())
        .collect();
    permissions.extend(explicit_permissions(&p.claims, registry.permission_claim()).listed());

    Json(serde_json::json!({
        "subject": principal.principal_id().to_string(),
        "username": p.username,
        "email": p.email,
        "roles": principal.roles().to_strings(),
        "permissions": permissions,
    }))
}
