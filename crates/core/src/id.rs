//! Strongly-typed names used across the policy layer.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Name of a guarded entity type (e.g. "Invoice").
///
/// Names are compared exactly; the derived policy id is lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityName(Cow<'static, str>);

/// Identifier of a policy (one per subscription, plus a derived one per entity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(Cow<'static, str>);

macro_rules! impl_name_newtype {
    ($t:ty) => {
        impl $t {
            pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&'static str> for $t {
            fn from(value: &'static str) -> Self {
                Self(Cow::Borrowed(value))
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(Cow::Owned(value))
            }
        }
    };
}

impl_name_newtype!(EntityName);
impl_name_newtype!(PolicyId);

/// Suffix appended to a lowercased entity name to form its aggregated policy id.
pub const DEFAULT_POLICY_SUFFIX: &str = ".policy";

impl PolicyId {
    /// Derived id of the aggregated policy for an entity: `<entity>.policy`.
    pub fn default_for(entity: &EntityName) -> Self {
        Self(Cow::Owned(format!(
            "{}{}",
            entity.as_str().to_lowercase(),
            DEFAULT_POLICY_SUFFIX
        )))
    }
}
