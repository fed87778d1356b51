use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Permission, Role};

/// Identity of the actor a decision is made for (user, service account, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(Cow<'static, str>);

impl SubjectId {
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for SubjectId {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A fully resolved subject for access decisions.
///
/// Construction is decoupled from authentication: the consumer maps whatever
/// identity it has onto roles, permissions and attributes. The policy layer
/// only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Subject {
    pub fn new(id: impl Into<SubjectId>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            permissions: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// True when the subject holds at least one of `roles`.
    pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a Role>) -> bool {
        roles.into_iter().any(|r| self.roles.contains(r))
    }

    /// Exact match, `"*"`, or a `"prefix.*"` covering `permission`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p.grants(permission))
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}
