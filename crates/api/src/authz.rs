//! API-side policy guard.
//!
//! Routes declare the named policy they require; the guard evaluates it
//! against the request principal before the handler runs.

use std::sync::Arc;

use axum::{
    extract::State,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use keygate_auth::{AuthzError, PolicyError, PolicyRegistry};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct PolicyGuard {
    registry: Arc<PolicyRegistry>,
    policy: &'static str,
}

impl PolicyGuard {
    pub fn new(registry: Arc<PolicyRegistry>, policy: &'static str) -> Self {
        Self { registry, policy }
    }

    /// Check the guard's policy for a principal.
    pub fn check(&self, principal: &PrincipalContext) -> Result<(), AuthzError> {
        self.registry
            .authorize(self.policy, principal.principal())
            .inspect_err(|err| {
                tracing::info!(
                    policy = self.policy,
                    subject = %principal.principal_id(),
                    reason = %err,
                    "request forbidden"
                );
            })
    }
}

/// Attach a named-policy guard to a method router.
///
/// Fails with [`PolicyError::Unregistered`] when `policy` is not in the
/// registry, so a misspelled guard stops router construction at startup.
pub fn require_policy<S>(
    registry: &Arc<PolicyRegistry>,
    policy: &'static str,
    route: MethodRouter<S>,
) -> Result<MethodRouter<S>, PolicyError>
where
    S: Clone + Send + Sync + 'static,
{
    registry.ensure_registered([policy])?;

    let guard = PolicyGuard::new(Arc::clone(registry), policy);
    Ok(route.route_layer(middleware::from_fn_with_state(guard, policy_middleware)))
}

async fn policy_middleware(
    State(guard): State<PolicyGuard>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = req
        .extensions()
        .get::<PrincipalContext>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthenticated("no authenticated principal".into()))?;

    guard.check(&principal)?;

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use keygate_auth::RolePermissions;
    use keygate_auth::policy::names;

    use super::*;

    fn registry() -> Arc<PolicyRegistry> {
        let registry = PolicyRegistry::standard(Arc::new(RolePermissions::standard()))
            .build()
            .unwrap();
        Arc::new(registry)
    }

    async fn ok() -> &'static str {
        "ok"
    }

    #[test]
    fn registered_policy_guards_the_route() {
        let route: Result<MethodRouter, _> = require_policy(&registry(), names::ADMIN_ONLY, get(ok));
        assert!(route.is_ok());
    }

    #[test]
    fn misspelled_policy_is_rejected() {
        let route: Result<MethodRouter, _> = require_policy(&registry(), "AdminOnyl", get(ok));
        assert_eq!(
            route.err(),
            Some(PolicyError::Unregistered(vec!["AdminOnyl".into()]))
        );
    }
}
