//! Request-boundary enforcement.
//!
//! One `authorize` call per request: aggregate, evaluate, reject or attach.
//! Downstream code then calls `scoped_filter` before fetching and `finish`
//! before responding.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use gatehouse_core::EntityName;
use gatehouse_policy::{
    Action, AggregationOptions, Decision, DecisionEngine, EvaluationRequest, FilterExpr,
    PolicyRegistry, apply_result_transform, merge_where, resolve_decision_from_request,
};

use crate::error::AccessError;
use crate::request::RequestContext;

/// What to do when no subscriber governs an entity.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Let the request through undecided.
    Allow,
    /// Reject with [`AccessError::NoPolicy`].
    #[default]
    Deny,
}

#[derive(Debug, Clone)]
pub struct AccessGuard {
    registry: Arc<PolicyRegistry>,
    engine: DecisionEngine,
    missing_policy: MissingPolicy,
    subject_in_hooks: bool,
}

impl AccessGuard {
    pub fn new(registry: Arc<PolicyRegistry>, missing_policy: MissingPolicy) -> Self {
        Self {
            registry,
            engine: DecisionEngine::new(),
            missing_policy,
            subject_in_hooks: false,
        }
    }

    /// Hand the request's subject to subscriber hooks during aggregation.
    ///
    /// Off by default: rules then check the subject at evaluation time and
    /// aggregates stay cacheable. When on, every aggregation bypasses the
    /// registry cache.
    pub fn with_subject_in_hooks(mut self) -> Self {
        self.subject_in_hooks = true;
        self
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Decide whether the request's subject may perform `action` on `entity`.
    ///
    /// `Ok(None)` only when no policy exists and missing policies are allowed.
    /// An ALLOW decision is also attached to `request`.
    pub async fn authorize(
        &self,
        request: &mut RequestContext,
        entity: &EntityName,
        action: &Action,
        resource: Option<Value>,
    ) -> Result<Option<Decision>, AccessError> {
        let subject = request
            .subject()
            .cloned()
            .ok_or(AccessError::MissingSubject)?;

        let mut options = AggregationOptions::new();
        if self.subject_in_hooks {
            options = options.with_subject(subject.clone());
        }
        let Some(policy) = self
            .registry
            .build_aggregated_policy(entity, action, &options)
            .await?
        else {
            return match self.missing_policy {
                MissingPolicy::Allow => {
                    debug!(%entity, %action, "no policy; letting request through");
                    Ok(None)
                }
                MissingPolicy::Deny => {
                    warn!(%entity, %action, "no policy; rejecting request");
                    Err(AccessError::NoPolicy {
                        entity: entity.clone(),
                    })
                }
            };
        };

        let mut evaluation = EvaluationRequest::new(&policy, subject).with_action(action.clone());
        if let Some(resource) = resource {
            evaluation = evaluation.with_resource(resource);
        }
        let decision = self.engine.evaluate(evaluation).await?;

        if decision.is_denied() {
            warn!(
                %entity,
                %action,
                subject = %decision.subject.id,
                policy_id = %decision.policy_id,
                "access denied"
            );
            return Err(AccessError::Forbidden {
                entity: entity.clone(),
                action: action.clone(),
            });
        }

        request.attach_decision(decision.clone());
        Ok(Some(decision))
    }

    /// `base` narrowed by the attached decision's scope, if any.
    pub fn scoped_filter(&self, request: &RequestContext, base: &FilterExpr) -> FilterExpr {
        match resolve_decision_from_request(request).and_then(|d| d.scope.as_ref()) {
            Some(scope) => merge_where(base, &scope.filter),
            None => base.clone(),
        }
    }

    /// Shape an outgoing payload with the attached decision's transforms.
    pub async fn finish(&self, request: &RequestContext, payload: Value) -> Result<Value, AccessError> {
        match resolve_decision_from_request(request) {
            Some(decision) => Ok(apply_result_transform(decision, payload).await?),
            None => Ok(payload),
        }
    }
}
