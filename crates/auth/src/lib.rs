//! `keygate-auth` — claims-derived authorization decisions (pure, no IO).
//!
//! Token verification happens before this crate is involved; it turns a
//! verified claim set into a [`Principal`] and evaluates named policies
//! against it.

pub mod claims;
pub mod explain;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use claims::{normalize, ClaimsError, RawClaims};
pub use explain::{explain, AuthorizationExplanation};
pub use permissions::{explicit_permissions, ExplicitPermissions, Permission, RolePermissions};
pub use policy::{
    Assertion, AssertionError, AuthzError, Decision, DenyReason, Policy, PolicyError, PolicyRegistry,
    PolicyRegistryBuilder,
};
pub use principal::{Principal, PrincipalId};
pub use roles::{Role, RoleSet};
