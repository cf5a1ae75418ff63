use std::borrow::{Borrow, Cow};
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Realm roles are carried verbatim. Client/resource roles are namespaced as
/// `"<resource>:<role>"` so they cannot collide with a realm role of the same
/// name. Comparison is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Build a resource-scoped role identifier (`"billing-api:viewer"`).
    pub fn resource(resource: &str, role: &str) -> Self {
        Self(Cow::Owned(format!("{resource}:{role}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

// `Cow<str>` orders and hashes as its `str`, so lookups by `&str` agree with `Role`.
impl Borrow<str> for Role {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Flat, deduplicated set of roles held by a principal.
///
/// Ordered so that serialized output and explanations are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the role was not already present.
    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// `true` when at least one role is held by both sets.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|r| r.as_str().to_string()).collect()
    }
}

impl Extend<Role> for RoleSet {
    fn extend<I: IntoIterator<Item = Role>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a Role;
    type IntoIter = std::collections::btree_set::Iter<'a, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
