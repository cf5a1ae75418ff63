//! Named authorization policies and their evaluation.
//!
//! A [`PolicyRegistry`] is built once at startup and is read-only afterwards,
//! so it can be shared across request tasks behind an `Arc` without locking.
//! Evaluation is a pure function of (registry, principal).

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::permissions::{explicit_permissions, ExplicitPermissions};
use crate::{Permission, Principal, Role, RolePermissions, RoleSet};

/// Default name of the explicit permission-list claim.
pub const DEFAULT_PERMISSION_CLAIM: &str = "permissions";

/// Well-known policy names registered by [`PolicyRegistry::standard`].
pub mod names {
    pub const ADMIN_ONLY: &str = "AdminOnly";
    pub const MANAGER_ONLY: &str = "ManagerOnly";
    pub const MANAGER_OR_ADMIN: &str = "ManagerOrAdmin";
    pub const USER_ACCESS: &str = "UserAccess";
    pub const CAN_READ: &str = "CanRead";
    pub const CAN_WRITE: &str = "CanWrite";
    pub const CAN_DELETE: &str = "CanDelete";
    pub const CAN_MANAGE: &str = "CanManage";
    pub const CAN_APPROVE: &str = "CanApprove";
}

/// Failure reported by an assertion predicate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AssertionError(String);

impl AssertionError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

type AssertionFn = dyn Fn(&Principal) -> Result<bool, AssertionError> + Send + Sync;

/// Arbitrary predicate over a principal.
///
/// An `Err` or a panic inside the predicate denies access.
#[derive(Clone)]
pub struct Assertion(Arc<AssertionFn>);

impl Assertion {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Principal) -> Result<bool, AssertionError> + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Wrap an infallible predicate.
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&Principal) -> bool + Send + Sync + 'static,
    {
        Self::new(move |principal| Ok(predicate(principal)))
    }

    fn check(&self, principal: &Principal) -> Result<bool, AssertionError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.0)(principal))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "assertion panicked".to_string());
                Err(AssertionError(format!("panic: {msg}")))
            }
        }
    }
}

impl core::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Assertion(..)")
    }
}

/// A named authorization rule.
#[derive(Debug, Clone)]
pub enum Policy {
    /// Satisfied when the principal holds at least one of these roles.
    Roles(RoleSet),
    /// Satisfied when the permission is role-derived or explicitly claimed.
    Permission(Permission),
    Assertion(Assertion),
}

impl Policy {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Roles(_) => "roles",
            Self::Permission(_) => "permission",
            Self::Assertion(_) => "assertion",
        }
    }
}

/// Why a policy check denied access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    MissingRole { accepted: Vec<String> },
    MissingPermission { permission: String },
    AssertionRejected,
    AssertionFailed { message: String },
    UnknownPolicy { policy: String },
}

impl core::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingRole { accepted } => write!(f, "requires one of roles {accepted:?}"),
            Self::MissingPermission { permission } => write!(f, "missing permission '{permission}'"),
            Self::AssertionRejected => f.write_str("assertion rejected the principal"),
            Self::AssertionFailed { message } => write!(f, "assertion failed: {message}"),
            Self::UnknownPolicy { policy } => write!(f, "unknown policy '{policy}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Registry construction / startup validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy '{0}' is registered twice")]
    Duplicate(String),

    #[error("role policy '{0}' accepts no roles")]
    EmptyRoleSet(String),

    #[error("policy name must not be empty")]
    EmptyName,

    #[error("unknown policies referenced: {0:?}")]
    Unregistered(Vec<String>),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden by policy '{policy}': {reason}")]
    Forbidden { policy: String, reason: DenyReason },

    #[error("unknown policy '{0}'")]
    UnknownPolicy(String),
}

/// Immutable set of named policies plus the role → permission table they use.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, Policy>,
    permissions: Arc<RolePermissions>,
    permission_claim: String,
}

impl PolicyRegistry {
    pub fn builder(permissions: Arc<RolePermissions>) -> PolicyRegistryBuilder {
        PolicyRegistryBuilder {
            policies: Vec::new(),
            permissions,
            permission_claim: DEFAULT_PERMISSION_CLAIM.to_string(),
        }
    }

    /// Builder pre-populated with the default policy set.
    pub fn standard(permissions: Arc<RolePermissions>) -> PolicyRegistryBuilder {
        use names::*;

        Self::builder(permissions)
            .require_roles(ADMIN_ONLY, ["admin"])
            .require_roles(MANAGER_ONLY, ["manager"])
            .require_roles(MANAGER_OR_ADMIN, ["manager", "admin"])
            .require_roles(USER_ACCESS, ["user", "manager", "admin"])
            .require_permission(CAN_READ, Permission::READ)
            .require_permission(CAN_WRITE, Permission::WRITE)
            .require_permission(CAN_DELETE, Permission::DELETE)
            .require_permission(CAN_MANAGE, Permission::MANAGE)
            .require_permission(CAN_APPROVE, Permission::APPROVE)
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn permissions(&self) -> &RolePermissions {
        &self.permissions
    }

    pub fn permission_claim(&self) -> &str {
        &self.permission_claim
    }

    /// Fail when any of `names` is not registered.
    ///
    /// Intended for startup, so a router referencing a missing policy never
    /// starts serving.
    pub fn ensure_registered<'a, I>(&self, names: I) -> Result<(), PolicyError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut missing: Vec<String> = names
            .into_iter()
            .filter(|name| !self.policies.contains_key(*name))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        missing.dedup();
        Err(PolicyError::Unregistered(missing))
    }

    /// Evaluate the named policy against a principal.
    ///
    /// An unknown name denies; it is never treated as allow.
    pub fn evaluate(&self, name: &str, principal: &Principal) -> Decision {
        let Some(policy) = self.policies.get(name) else {
            tracing::error!(policy = name, "authorization requested for unregistered policy");
            return Decision::Deny(DenyReason::UnknownPolicy { policy: name.to_string() });
        };

        let decision = self.evaluate_policy(policy, principal);
        match &decision {
            Decision::Allow => {
                tracing::trace!(policy = name, subject = %principal.subject, "policy allowed");
            }
            Decision::Deny(DenyReason::AssertionFailed { message }) => {
                tracing::warn!(policy = name, subject = %principal.subject, error = %message, "assertion policy failed; denying");
            }
            Decision::Deny(reason) => {
                tracing::debug!(policy = name, subject = %principal.subject, %reason, "policy denied");
            }
        }
        decision
    }

    pub fn is_allowed(&self, name: &str, principal: &Principal) -> bool {
        self.evaluate(name, principal).is_allowed()
    }

    pub fn authorize(&self, name: &str, principal: &Principal) -> Result<(), AuthzError> {
        match self.evaluate(name, principal) {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::UnknownPolicy { policy }) => Err(AuthzError::UnknownPolicy(policy)),
            Decision::Deny(reason) => Err(AuthzError::Forbidden {
                policy: name.to_string(),
                reason,
            }),
        }
    }

    fn evaluate_policy(&self, policy: &Policy, principal: &Principal) -> Decision {
        match policy {
            Policy::Roles(accepted) => {
                if principal.roles.intersects(accepted) {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::MissingRole { accepted: accepted.to_strings() })
                }
            }
            Policy::Permission(required) => {
                if self.explicit_permissions(principal).contains(required)
                    || self.permissions.derive(&principal.roles).contains(required)
                {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::MissingPermission {
                        permission: required.as_str().to_string(),
                    })
                }
            }
            Policy::Assertion(assertion) => match assertion.check(principal) {
                Ok(true) => Decision::Allow,
                Ok(false) => Decision::Deny(DenyReason::AssertionRejected),
                Err(err) => Decision::Deny(DenyReason::AssertionFailed { message: err.to_string() }),
            },
        }
    }

    pub(crate) fn explicit_permissions(&self, principal: &Principal) -> ExplicitPermissions {
        explicit_permissions(&principal.claims, &self.permission_claim)
    }
}

/// Collects policy registrations; validation happens in [`build`](Self::build).
#[derive(Debug)]
pub struct PolicyRegistryBuilder {
    policies: Vec<(String, Policy)>,
    permissions: Arc<RolePermissions>,
    permission_claim: String,
}

impl PolicyRegistryBuilder {
    pub fn require_roles<I, R>(mut self, name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        let roles: RoleSet = roles.into_iter().map(Into::into).collect();
        self.policies.push((name.into(), Policy::Roles(roles)));
        self
    }

    pub fn require_permission(mut self, name: impl Into<String>, permission: Permission) -> Self {
        self.policies.push((name.into(), Policy::Permission(permission)));
        self
    }

    pub fn require_assertion(mut self, name: impl Into<String>, assertion: Assertion) -> Self {
        self.policies.push((name.into(), Policy::Assertion(assertion)));
        self
    }

    /// Override the name of the explicit permission-list claim.
    pub fn permission_claim(mut self, claim: impl Into<String>) -> Self {
        self.permission_claim = claim.into();
        self
    }

    pub fn build(self) -> Result<PolicyRegistry, PolicyError> {
        let mut policies = BTreeMap::new();
        for (name, policy) in self.policies {
            if name.is_empty() {
                return Err(PolicyError::EmptyName);
            }
            if let Policy::Roles(roles) = &policy {
                if roles.is_empty() {
                    return Err(PolicyError::EmptyRoleSet(name));
                }
            }
            if policies.contains_key(&name) {
                return Err(PolicyError::Duplicate(name));
            }
            policies.insert(name, policy);
        }

        tracing::debug!(count = policies.len(), "policy registry built");
        Ok(PolicyRegistry {
            policies,
            permissions: self.permissions,
            permission_claim: self.permission_claim,
        })
    }
}
