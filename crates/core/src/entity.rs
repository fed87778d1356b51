//! Entity metadata: what the policy layer knows about a guarded entity type.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::EntityName;

/// Metadata describing a guarded entity type.
///
/// Only relation fields are tracked; they decide whether an owner scope filters
/// on `{field: id}` or `{field: {id: id}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub entity: EntityName,
    #[serde(default)]
    pub relations: BTreeSet<String>,
}

impl EntityMetadata {
    pub fn new(entity: impl Into<EntityName>) -> Self {
        Self {
            entity: entity.into(),
            relations: BTreeSet::new(),
        }
    }

    pub fn with_relation(mut self, field: impl Into<String>) -> Self {
        self.relations.insert(field.into());
        self
    }

    pub fn is_relation(&self, field: &str) -> bool {
        self.relations.contains(field)
    }
}
