use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::claims::RawClaims;
use crate::{Role, RoleSet};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "read", "manage"). The IdP does not
/// send them per role; they are derived through [`RolePermissions`] or taken
/// from an explicit permission-list claim on the token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const READ: Permission = Permission(Cow::Borrowed("read"));
    pub const WRITE: Permission = Permission(Cow::Borrowed("write"));
    pub const DELETE: Permission = Permission(Cow::Borrowed("delete"));
    pub const MANAGE: Permission = Permission(Cow::Borrowed("manage"));
    pub const APPROVE: Permission = Permission(Cow::Borrowed("approve"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable role → permission table.
///
/// Built once at startup and shared by reference; unknown roles map to the
/// empty permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePermissions {
    table: BTreeMap<Role, BTreeSet<Permission>>,
}

impl RolePermissions {
    /// The process-wide default mapping.
    pub fn standard() -> Self {
        Self::from_entries([
            (
                "admin",
                vec![Permission::READ, Permission::WRITE, Permission::DELETE, Permission::MANAGE],
            ),
            ("manager", vec![Permission::READ, Permission::WRITE, Permission::APPROVE]),
            ("user", vec![Permission::READ]),
            ("editor", vec![Permission::READ, Permission::WRITE]),
        ])
    }

    pub fn from_entries<I, R, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (R, P)>,
        R: Into<Role>,
        P: IntoIterator<Item = Permission>,
    {
        let mut table: BTreeMap<Role, BTreeSet<Permission>> = BTreeMap::new();
        for (role, perms) in entries {
            table.entry(role.into()).or_default().extend(perms);
        }
        Self { table }
    }

    /// Permissions granted by a single role (empty for unknown roles).
    pub fn permissions_for(&self, role: &Role) -> BTreeSet<Permission> {
        self.table.get(role).cloned().unwrap_or_default()
    }

    /// Union of permissions reachable from every role in the set.
    pub fn derive(&self, roles: &RoleSet) -> BTreeSet<Permission> {
        roles
            .iter()
            .filter_map(|role| self.table.get(role))
            .flat_map(|perms| perms.iter().cloned())
            .collect()
    }

    /// Roles whose mapping includes `permission`.
    pub fn roles_granting(&self, permission: &Permission) -> Vec<Role> {
        self.table
            .iter()
            .filter(|(_, perms)| perms.contains(permission))
            .map(|(role, _)| role.clone())
            .collect()
    }

    pub fn roles(&self) -> impl Iterator<Item = (&Role, &BTreeSet<Permission>)> {
        self.table.iter()
    }
}

/// Outcome of reading the explicit permission-list claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplicitPermissions {
    /// The claim is not on the token.
    Absent,
    /// The claim is present but not an array of strings.
    Unparseable,
    Listed(BTreeSet<Permission>),
}

impl ExplicitPermissions {
    pub fn contains(&self, permission: &Permission) -> bool {
        match self {
            Self::Listed(perms) => perms.contains(permission),
            Self::Absent | Self::Unparseable => false,
        }
    }

    pub fn listed(&self) -> Vec<String> {
        match self {
            Self::Listed(perms) => perms.iter().map(|p| p.as_str().to_string()).collect(),
            Self::Absent | Self::Unparseable => Vec::new(),
        }
    }
}

/// Read the explicit permission-list claim named `claim`.
///
/// A value that is not an array of strings never fails the caller; the
/// permission check falls back to role-derived permissions only.
pub fn explicit_permissions(claims: &RawClaims, claim: &str) -> ExplicitPermissions {
    let Some(value) = claims.get(claim) else {
        return ExplicitPermissions::Absent;
    };

    match serde_json::from_value::<Vec<String>>(value.clone()) {
        Ok(list) => ExplicitPermissions::Listed(list.into_iter().map(Permission::new).collect()),
        Err(err) => {
            tracing::debug!(claim, kind = value_kind(value), error = %err, "ignoring unparseable permission claim");
            ExplicitPermissions::Unparseable
        }
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
