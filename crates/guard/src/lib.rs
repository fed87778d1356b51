//! `gatehouse-guard`: enforcing decisions at a request boundary.
//!
//! The guard resolves a policy for an entity/action, evaluates it for the
//! request's subject, rejects DENY, and leaves the ALLOW decision on the
//! request so the data layer can scope queries and shape results.

pub mod error;
pub mod guard;
pub mod request;

pub use error::AccessError;
pub use guard::{AccessGuard, MissingPolicy};
pub use request::RequestContext;
