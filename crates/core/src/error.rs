//! Policy error model.

use thiserror::Error;

/// Result type used across the policy layer.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Policy-level error.
///
/// Every failure raised by host-supplied code (hooks, conditions, scopes,
/// transforms) is carried through unchanged to the caller. There are no
/// retries and no per-subscription isolation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A subscriber hook failed while producing rules.
    #[error("hook failed for policy '{policy_id}': {message}")]
    Hook { policy_id: String, message: String },

    /// A rule condition failed to evaluate.
    #[error("condition failed: {0}")]
    Condition(String),

    /// A rule scope function failed.
    #[error("scope failed: {0}")]
    Scope(String),

    /// A result transform failed.
    #[error("result transform failed: {0}")]
    Transform(String),

    /// An action name could not be interpreted.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Configuration was malformed (e.g. bad environment value).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Shared registry state was poisoned by a panicking writer.
    #[error("registry lock poisoned")]
    LockPoisoned,
}

impl PolicyError {
    pub fn hook(policy_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Hook {
            policy_id: policy_id.into(),
            message: msg.into(),
        }
    }

    pub fn condition(msg: impl Into<String>) -> Self {
        Self::Condition(msg.into())
    }

    pub fn scope(msg: impl Into<String>) -> Self {
        Self::Scope(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    pub fn invalid_action(msg: impl Into<String>) -> Self {
        Self::InvalidAction(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PolicyError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
