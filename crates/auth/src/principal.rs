use serde::{Deserialize, Serialize};

use crate::claims::{self, RawClaims};
use crate::RoleSet;

/// Identity of an authenticated principal, as issued by the IdP (`sub`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated caller of a single request.
///
/// Built once per request by [`claims::normalize`] and not shared across
/// requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub subject: PrincipalId,
    pub username: String,
    pub email: Option<String>,
    /// Flat role set: direct roles, realm roles and `resource:role` identifiers.
    pub roles: RoleSet,
    /// The verified claim set the principal was built from.
    pub claims: RawClaims,
}

impl Principal {
    /// Merge every role discoverable from the retained claims into the role set.
    ///
    /// Idempotent: the role set is a set, so repeated calls add nothing new.
    pub fn normalize_roles(&mut self) {
        let discovered = claims::role_set(&self.claims);
        self.roles.extend(discovered.iter().cloned());
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
