//! `gatehouse-auth`: the subject an access decision is made for.
//!
//! Subjects arrive pre-resolved; this crate never authenticates anything.

pub mod permissions;
pub mod roles;
pub mod subject;

pub use permissions::Permission;
pub use roles::Role;
pub use subject::{Subject, SubjectId};
