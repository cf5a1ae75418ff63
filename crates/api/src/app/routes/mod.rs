use std::sync::Arc;

use axum::{routing::get, Router};

use keygate_auth::{PolicyError, PolicyRegistry};
use keygate_auth::policy::names;

use crate::authz::require_policy;

pub mod authz;
pub mod system;

/// Router for all authenticated endpoints.
///
/// Fails when a guarded route names a policy the registry does not know.
pub fn router(registry: &Arc<PolicyRegistry>) -> Result<Router, PolicyError> {
    let router = Router::new()
        .route("/me", get(system::whoami))
        .route("/authz/check/:policy", get(authz::check_policy))
        .route("/authz/explain/:policy", get(authz::explain_policy))
        .route(
            "/authz/policies",
            require_policy(registry, names::ADMIN_ONLY, get(authz::list_policies))?,
        )
        .route(
            "/authz/roles",
            require_policy(registry, names::CAN_MANAGE, get(authz::list_roles))?,
        );

    Ok(router)
}
