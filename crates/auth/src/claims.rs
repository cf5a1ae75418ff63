use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::permissions::value_kind;
use crate::{Principal, PrincipalId, Role, RoleSet};

/// Claim carrying realm-level roles: `{"roles": [..]}`.
pub const REALM_ACCESS: &str = "realm_access";

/// Claim carrying per-client roles: `{"<resource>": {"roles": [..]}}`.
pub const RESOURCE_ACCESS: &str = "resource_access";

/// Flat role claims a transport layer may already have populated.
pub const DIRECT_ROLE_CLAIMS: [&str; 2] = ["roles", "role"];

/// Claim set of a token that has already been verified (signature, issuer,
/// audience, expiry) by whatever layer sits in front of this crate.
///
/// Duplicate keys collapse to the last value seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawClaims(BTreeMap<String, Value>);

impl RawClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    /// A claim's value when it is a plain string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

impl From<serde_json::Map<String, Value>> for RawClaims {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for RawClaims {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token has no subject claim")]
    MissingSubject,
}

/// Decoded shape of `realm_access` and of each `resource_access` entry.
#[derive(Debug, Clone, Default, Deserialize)]
struct RoleList {
    roles: Vec<String>,
}

/// Realm roles from `realm_access.roles`, verbatim.
///
/// Absent or malformed claims yield no roles.
pub fn realm_roles(claims: &RawClaims) -> Vec<Role> {
    decode::<RoleList>(claims, REALM_ACCESS)
        .map(|access| access.roles.into_iter().map(Role::from).collect())
        .unwrap_or_default()
}

/// Client/resource roles from `resource_access`, as `"<resource>:<role>"`.
///
/// A claim that is not an object yields no roles. Each resource entry is
/// decoded on its own; a malformed entry is skipped without affecting the rest.
pub fn resource_roles(claims: &RawClaims) -> Vec<Role> {
    let Some(resources) = decode::<BTreeMap<String, Value>>(claims, RESOURCE_ACCESS) else {
        return Vec::new();
    };

    resources
        .into_iter()
        .filter_map(|(resource, value)| match serde_json::from_value::<RoleList>(value) {
            Ok(access) => Some((resource, access)),
            Err(err) => {
                tracing::debug!(claim = RESOURCE_ACCESS, resource = %resource, error = %err, "ignoring malformed resource entry");
                None
            }
        })
        .flat_map(|(resource, access)| {
            access
                .roles
                .into_iter()
                .map(move |role| Role::resource(&resource, &role))
        })
        .collect()
}

/// Roles delivered directly as a flat `roles`/`role` claim (array or single string).
pub fn direct_roles(claims: &RawClaims) -> Vec<Role> {
    DIRECT_ROLE_CLAIMS
        .iter()
        .filter_map(|name| claims.get(name).map(|value| (*name, value)))
        .flat_map(|(name, value)| match value {
            Value::String(role) => vec![Role::from(role.clone())],
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|role| Role::from(role.to_string()))
                .collect(),
            other => {
                tracing::debug!(claim = name, kind = value_kind(other), "ignoring non-string role claim");
                Vec::new()
            }
        })
        .collect()
}

/// Every role discoverable from the claim set, flattened and deduplicated.
pub fn role_set(claims: &RawClaims) -> RoleSet {
    let mut roles = RoleSet::new();
    roles.extend(direct_roles(claims));
    roles.extend(realm_roles(claims));
    roles.extend(resource_roles(claims));
    roles
}

/// Build the request principal from a verified claim set.
///
/// Only a missing subject is an error. Nested role structures that do not
/// have the expected shape contribute no roles.
pub fn normalize(claims: RawClaims) -> Result<Principal, ClaimsError> {
    let subject = claims
        .get_str("sub")
        .filter(|sub| !sub.is_empty())
        .ok_or(ClaimsError::MissingSubject)?
        .to_string();

    let username = claims
        .get_str("preferred_username")
        .unwrap_or(&subject)
        .to_string();
    let email = claims.get_str("email").map(str::to_string);

    let mut principal = Principal {
        subject: PrincipalId::new(subject),
        username,
        email,
        roles: RoleSet::new(),
        claims,
    };
    principal.normalize_roles();
    Ok(principal)
}

fn decode<T: serde::de::DeserializeOwned>(claims: &RawClaims, name: &str) -> Option<T> {
    let value = claims.get(name)?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::debug!(claim = name, kind = value_kind(value), error = %err, "ignoring malformed role claim");
            None
        }
    }
}
