use std::collections::HashMap;
use std::sync::Arc;

use gatehouse_auth::Subject;
use gatehouse_policy::{DECISION_METADATA_KEY, DECISION_PROPERTY, Decision, DecisionCarrier};

/// Request-scoped state a guard reads from and writes decisions onto.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    subject: Option<Arc<Subject>>,
    metadata: HashMap<String, Decision>,
    properties: HashMap<String, Decision>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_subject(subject: Subject) -> Self {
        Self {
            subject: Some(Arc::new(subject)),
            ..Self::default()
        }
    }

    pub fn subject(&self) -> Option<&Arc<Subject>> {
        self.subject.as_ref()
    }

    /// Store `decision` under the well-known metadata key, replacing any
    /// earlier one.
    pub fn attach_decision(&mut self, decision: Decision) {
        self.metadata
            .insert(DECISION_METADATA_KEY.to_string(), decision);
    }

    /// Store `decision` as the plain `accessDecision` property.
    pub fn set_decision_property(&mut self, decision: Decision) {
        self.properties.insert(DECISION_PROPERTY.to_string(), decision);
    }

    pub fn clear_decision(&mut self) {
        self.metadata.remove(DECISION_METADATA_KEY);
        self.properties.remove(DECISION_PROPERTY);
    }
}

impl DecisionCarrier for RequestContext {
    fn decision_metadata(&self, key: &str) -> Option<&Decision> {
        self.metadata.get(key)
    }

    fn decision_property(&self, name: &str) -> Option<&Decision> {
        self.properties.get(name)
    }
}
