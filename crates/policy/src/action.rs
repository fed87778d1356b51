//! Actions a policy is aggregated for.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use gatehouse_core::PolicyError;

/// Standard CRUD-style actions with a dedicated subscriber hook.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteType {
    Create,
    Get,
    GetList,
    Update,
    PartialUpdate,
    Delete,
}

impl RouteType {
    pub const ALL: [RouteType; 6] = [
        RouteType::Create,
        RouteType::Get,
        RouteType::GetList,
        RouteType::Update,
        RouteType::PartialUpdate,
        RouteType::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Create => "create",
            RouteType::Get => "get",
            RouteType::GetList => "getList",
            RouteType::Update => "update",
            RouteType::PartialUpdate => "partialUpdate",
            RouteType::Delete => "delete",
        }
    }

    /// Case-insensitive; `_` and `-` separators are ignored
    /// (`getList`, `get_list`, `GET_LIST` all match).
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self::ALL
            .into_iter()
            .find(|route| route.as_str().to_ascii_lowercase() == normalized)
    }
}

impl core::fmt::Display for RouteType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation being attempted on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Action {
    /// A standard route action.
    Route(RouteType),
    /// Any other named operation (e.g. "approve", "export").
    Custom(String),
}

impl Action {
    /// Action for a named operation. Route names (`"get"`, `"GET_LIST"`, ...)
    /// still resolve to [`Action::Route`], so both spellings share hooks and
    /// cache entries.
    pub fn custom(name: impl Into<String>) -> Self {
        let name = name.into();
        match RouteType::parse(name.trim()) {
            Some(route) => Self::Route(route),
            None => Self::Custom(name),
        }
    }

    pub fn route_type(&self) -> Option<RouteType> {
        match self {
            Action::Route(route) => Some(*route),
            Action::Custom(_) => None,
        }
    }
}

impl From<RouteType> for Action {
    fn from(value: RouteType) -> Self {
        Self::Route(value)
    }
}

impl FromStr for Action {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::invalid_action("action name is empty"));
        }

        Ok(match RouteType::parse(trimmed) {
            Some(route) => Action::Route(route),
            None => Action::Custom(trimmed.to_string()),
        })
    }
}

impl TryFrom<String> for Action {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        value.to_string()
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Action::Route(route) => f.write_str(route.as_str()),
            Action::Custom(name) => f.write_str(name),
        }
    }
}
