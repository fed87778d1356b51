//! `gatehouse-core`: shared building blocks for the access-decision engine.
//!
//! This crate contains identifiers, the error model, entity metadata and the
//! clock abstraction (no policy logic).

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::EntityMetadata;
pub use error::{PolicyError, PolicyResult};
pub use id::{EntityName, PolicyId};
