use std::sync::Arc;

use keygate_auth::{Principal, PrincipalId, RoleSet};

/// Principal context for a request (authenticated identity + normalized roles).
///
/// Inserted by the auth middleware; immutable for the rest of the request.
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    principal: Arc<Principal>,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal: Arc::new(principal),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal.subject
    }

    pub fn roles(&self) -> &RoleSet {
        &self.principal.roles
    }
}
