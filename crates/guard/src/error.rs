use thiserror::Error;

use gatehouse_core::{EntityName, PolicyError};
use gatehouse_policy::Action;

/// Why a request was not let through.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The policy evaluated to DENY.
    #[error("forbidden: '{action}' on '{entity}'")]
    Forbidden { entity: EntityName, action: Action },

    /// No subscriber governs the entity and missing policies are denied.
    #[error("no access policy configured for '{entity}'")]
    NoPolicy { entity: EntityName },

    /// The request carries no resolved subject.
    #[error("request has no subject")]
    MissingSubject,

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl AccessError {
    /// True for outcomes a transport would report as "forbidden" rather than
    /// as a server fault.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Forbidden { .. } | Self::NoPolicy { .. })
    }
}
