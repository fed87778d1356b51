//! Inputs handed to subscriber hooks at aggregation time.

use std::sync::Arc;

use serde_json::Value;

use gatehouse_auth::Subject;
use gatehouse_core::{EntityMetadata, EntityName, PolicyId};

use crate::action::{Action, RouteType};
use crate::builders::RuleKit;

/// Per-call aggregation options.
#[derive(Debug, Clone, Default)]
pub struct AggregationOptions {
    /// Subject resolved by the consumer from its authentication data, if any.
    pub subject: Option<Arc<Subject>>,
    /// Free-form request data passed through to hooks untouched.
    pub data: Option<Arc<Value>>,
}

impl AggregationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: Arc<Subject>) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    /// Carries a subject or request data, so hooks may tailor rules to this
    /// one request. Such aggregations bypass the policy cache.
    pub fn is_request_specific(&self) -> bool {
        self.subject.is_some() || self.data.is_some()
    }
}

/// Context for one subscription's hook invocation.
///
/// `subject` and `data` are set only when the caller passed them in
/// [`AggregationOptions`]; such aggregations are never cached, so a rule set
/// chosen from them cannot reach another request. Hooks that should stay
/// cacheable leave subject checks to `Rule::when`, which sees the
/// evaluation-time `EvalContext`.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub entity: EntityName,
    pub entity_metadata: Option<Arc<EntityMetadata>>,
    pub subject: Option<Arc<Subject>>,
    pub data: Option<Arc<Value>>,
    pub action: Action,
    pub route_type: Option<RouteType>,
    /// The subscription whose hook is running.
    pub policy_id: PolicyId,
}

impl HookContext {
    pub fn new(entity: EntityName, action: Action, policy_id: PolicyId) -> Self {
        let route_type = action.route_type();
        Self {
            entity,
            entity_metadata: None,
            subject: None,
            data: None,
            action,
            route_type,
            policy_id,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<Arc<EntityMetadata>>) -> Self {
        self.entity_metadata = metadata;
        self
    }

    pub fn with_options(mut self, options: &AggregationOptions) -> Self {
        self.subject = options.subject.clone();
        self.data = options.data.clone();
        self
    }

    /// Rule builders aware of this entity's relation fields.
    pub fn rules(&self) -> RuleKit<'_> {
        RuleKit::new(self.entity_metadata.as_deref())
    }
}
