//! Decision engine: ordered, deny-overrides evaluation of a policy.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use gatehouse_auth::Subject;
use gatehouse_core::PolicyResult;

use crate::action::Action;
use crate::decision::Decision;
use crate::registry::Policy;
use crate::rule::{Effect, EvalContext};
use crate::scope::Scope;

/// One evaluation: a policy applied to a subject and (optionally) a resource.
#[derive(Debug, Clone)]
pub struct EvaluationRequest<'a> {
    pub action: Action,
    pub policy: &'a Policy,
    pub resource: Option<Arc<Value>>,
    pub subject: Arc<Subject>,
}

impl<'a> EvaluationRequest<'a> {
    /// Evaluate `policy` for its own action.
    pub fn new(policy: &'a Policy, subject: Arc<Subject>) -> Self {
        Self {
            action: policy.action.clone(),
            policy,
            resource: None,
            subject,
        }
    }

    pub fn with_resource(mut self, resource: Value) -> Self {
        self.resource = Some(Arc::new(resource));
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }
}

/// Evaluates a policy's rules in aggregated order.
///
/// - Rules run strictly one after another; order is load-bearing.
/// - The first matching DENY wins immediately and discards earlier ALLOWs.
/// - No matching rule at all is a DENY with no applied rules.
/// - Matching ALLOW scopes are merged left to right; transforms are kept in
///   encounter order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    pub async fn evaluate(&self, request: EvaluationRequest<'_>) -> PolicyResult<Decision> {
        let EvaluationRequest {
            action,
            policy,
            resource,
            subject,
        } = request;
        let ctx = EvalContext::new(subject, resource);

        let mut matched = Vec::new();
        let mut scope: Option<Scope> = None;
        let mut transforms = Vec::new();

        for rule in &policy.rules {
            if !rule.matches(&ctx).await? {
                continue;
            }

            if rule.effect == Effect::Deny {
                debug!(
                    entity = %policy.entity,
                    %action,
                    policy_id = ?rule.policy_id,
                    rule = ?rule.description,
                    "access denied by rule"
                );
                return Ok(Decision::new(action, policy, ctx, Effect::Deny, vec![rule.clone()]));
            }

            if let Some(scope_fn) = &rule.scope {
                let patch = scope_fn(ctx.clone()).await?;
                scope = Some(match scope {
                    None => patch,
                    Some(current) => current.merge(&patch),
                });
            }
            if let Some(transform) = &rule.result_transform {
                transforms.push(transform.clone());
            }
            matched.push(rule.clone());
        }

        if matched.is_empty() {
            debug!(entity = %policy.entity, %action, "access denied: no matching rule");
            return Ok(Decision::new(action, policy, ctx, Effect::Deny, Vec::new()));
        }

        debug!(
            entity = %policy.entity,
            %action,
            applied = matched.len(),
            scoped = scope.is_some(),
            transforms = transforms.len(),
            "access allowed"
        );

        let mut decision = Decision::new(action, policy, ctx, Effect::Allow, matched);
        decision.scope = scope;
        decision.transforms = transforms;
        Ok(decision)
    }
}
