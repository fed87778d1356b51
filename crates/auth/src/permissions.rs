use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A dotted capability name such as `"invoice.read"`.
///
/// `"*"` grants everything; a trailing `".*"` (`"invoice.*"`) grants every
/// permission under that prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: &'static str = "*";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == Self::WILDCARD
    }

    /// Whether holding `self` satisfies a check for `required`.
    pub fn grants(&self, required: &str) -> bool {
        if self.is_wildcard() || self.as_str() == required {
            return true;
        }
        match self.as_str().strip_suffix(".*") {
            Some(prefix) => required
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.')),
            None => false,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_global_wildcard() {
        assert!(Permission::new("invoice.read").grants("invoice.read"));
        assert!(!Permission::new("invoice.read").grants("invoice.write"));
        assert!(Permission::new("*").grants("anything.at.all"));
    }

    #[test]
    fn namespace_wildcard() {
        let perm = Permission::new("invoice.*");
        assert!(perm.grants("invoice.read"));
        assert!(perm.grants("invoice.line.delete"));
        assert!(!perm.grants("invoice"));
        assert!(!perm.grants("invoices.read"));
    }
}
