//! Decisions and the utilities consumers use to apply them.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use gatehouse_auth::{Subject, SubjectId};
use gatehouse_core::{EntityName, PolicyId, PolicyResult};

use crate::action::Action;
use crate::registry::Policy;
use crate::rule::{Effect, EvalContext, Rule, TransformFn};
use crate::scope::Scope;

/// Metadata key a consumer stores the decision under on its request object.
pub const DECISION_METADATA_KEY: &str = "gatehouse:access-decision";

/// Plain property name checked when the metadata key is absent.
pub const DECISION_PROPERTY: &str = "accessDecision";

/// Outcome of evaluating one policy for one subject (and resource).
#[derive(Clone)]
pub struct Decision {
    pub action: Action,
    /// For DENY: the single deny rule that fired, or empty when nothing matched.
    pub applied_rules: Vec<Rule>,
    pub effect: Effect,
    pub policy_id: PolicyId,
    pub policy_ids: Vec<PolicyId>,
    pub resource: Option<Arc<Value>>,
    pub resource_type: EntityName,
    /// Present only on ALLOW, and only when a matching rule contributed one.
    pub scope: Option<Scope>,
    pub subject: Arc<Subject>,
    /// Empty on DENY.
    pub transforms: Vec<TransformFn>,
}

impl Decision {
    pub(crate) fn new(
        action: Action,
        policy: &Policy,
        ctx: EvalContext,
        effect: Effect,
        applied_rules: Vec<Rule>,
    ) -> Self {
        Self {
            action,
            applied_rules,
            effect,
            policy_id: policy.policy_id.clone(),
            policy_ids: policy.policy_ids.clone(),
            resource: ctx.resource,
            resource_type: policy.entity.clone(),
            scope: None,
            subject: ctx.subject,
            transforms: Vec::new(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }

    pub fn is_denied(&self) -> bool {
        self.effect == Effect::Deny
    }

    /// Context handed to transforms.
    pub fn context(&self) -> EvalContext {
        EvalContext::new(self.subject.clone(), self.resource.clone())
    }

    /// Serializable summary for audit logs.
    pub fn explain(&self) -> DecisionExplanation {
        DecisionExplanation {
            action: self.action.to_string(),
            effect: self.effect,
            resource_type: self.resource_type.clone(),
            subject: self.subject.id.clone(),
            policy_id: self.policy_id.clone(),
            policy_ids: self.policy_ids.clone(),
            applied_rules: self
                .applied_rules
                .iter()
                .map(|rule| AppliedRule {
                    effect: rule.effect,
                    policy_id: rule.policy_id.clone(),
                    description: rule.description.clone(),
                })
                .collect(),
            scope: self.scope.clone(),
            transforms: self.transforms.len(),
        }
    }
}

impl core::fmt::Debug for Decision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Decision")
            .field("action", &self.action)
            .field("effect", &self.effect)
            .field("applied_rules", &self.applied_rules)
            .field("policy_id", &self.policy_id)
            .field("policy_ids", &self.policy_ids)
            .field("resource", &self.resource)
            .field("resource_type", &self.resource_type)
            .field("scope", &self.scope)
            .field("subject", &self.subject.id)
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionExplanation {
    pub action: String,
    pub effect: Effect,
    pub resource_type: EntityName,
    pub subject: SubjectId,
    pub policy_id: PolicyId,
    pub policy_ids: Vec<PolicyId>,
    pub applied_rules: Vec<AppliedRule>,
    pub scope: Option<Scope>,
    pub transforms: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedRule {
    pub effect: Effect,
    pub policy_id: Option<PolicyId>,
    pub description: Option<String>,
}

/// Fold the decision's transforms over `payload`, in order.
pub async fn apply_result_transform(decision: &Decision, payload: Value) -> PolicyResult<Value> {
    if decision.transforms.is_empty() {
        return Ok(payload);
    }

    let ctx = decision.context();
    let mut payload = payload;
    for transform in &decision.transforms {
        payload = transform(payload, ctx.clone()).await?;
    }
    Ok(payload)
}

/// Copy of `decision` whose transforms will see `resource`.
pub fn attach_decision_to_resource(decision: &Decision, resource: Value) -> Decision {
    let mut attached = decision.clone();
    attached.resource = Some(Arc::new(resource));
    attached
}

/// A caller-owned request-like object a decision can be stored on.
pub trait DecisionCarrier {
    /// Decision stored under a metadata key.
    fn decision_metadata(&self, key: &str) -> Option<&Decision>;

    /// Decision stored as a plain named property.
    fn decision_property(&self, _name: &str) -> Option<&Decision> {
        None
    }
}

/// Find a previously attached decision: metadata key first, then property.
pub fn resolve_decision_from_request<R>(request: &R) -> Option<&Decision>
where
    R: DecisionCarrier + ?Sized,
{
    request
        .decision_metadata(DECISION_METADATA_KEY)
        .or_else(|| request.decision_property(DECISION_PROPERTY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use gatehouse_core::PolicyError;
    use serde_json::json;

    use crate::action::RouteType;
    use crate::engine::{DecisionEngine, EvaluationRequest};

    fn policy(rules: Vec<Rule>) -> Policy {
        let entity = EntityName::new("Profile");
        Policy {
            action: RouteType::Get.into(),
            policy_id: PolicyId::default_for(&entity),
            entity,
            policy_ids: vec![PolicyId::new("profile.privacy")],
            rules,
        }
    }

    async fn decide(rules: Vec<Rule>) -> Decision {
        let policy = policy(rules);
        DecisionEngine::new()
            .evaluate(EvaluationRequest::new(&policy, Arc::new(Subject::new("u-1"))))
            .await
            .unwrap()
    }

    fn redact(field: &'static str) -> Rule {
        Rule::allow().transform(move |mut payload, _| {
            if let Some(obj) = payload.as_object_mut() {
                obj.remove(field);
            }
            payload
        })
    }

    #[tokio::test]
    async fn transforms_fold_in_order() {
        let decision = decide(vec![
            Rule::allow().transform(|p, _| json!({"wrapped": p})),
            Rule::allow().transform(|p, _| json!([p])),
        ])
        .await;

        let out = apply_result_transform(&decision, json!(1)).await.unwrap();
        assert_eq!(out, json!([{"wrapped": 1}]));
    }

    #[tokio::test]
    async fn no_transforms_is_identity() {
        let decision = decide(vec![Rule::allow()]).await;
        let payload = json!({"email": "a@example.com"});
        assert_eq!(
            apply_result_transform(&decision, payload.clone()).await.unwrap(),
            payload
        );
    }

    #[tokio::test]
    async fn transforms_see_attached_resource() {
        let decision = decide(vec![Rule::allow().transform(|payload, ctx| {
            json!({
                "payload": payload,
                "resource": ctx.resource().cloned(),
                "subject": ctx.subject.id.as_str(),
            })
        })])
        .await;

        let attached = attach_decision_to_resource(&decision, json!({"id": "p-1"}));
        assert!(decision.resource.is_none());

        let out = apply_result_transform(&attached, json!("body")).await.unwrap();
        assert_eq!(
            out,
            json!({"payload": "body", "resource": {"id": "p-1"}, "subject": "u-1"})
        );
    }

    #[tokio::test]
    async fn redaction_chain() {
        let decision = decide(vec![redact("email"), redact("phone")]).await;
        let out = apply_result_transform(
            &decision,
            json!({"name": "Ada", "email": "ada@example.com", "phone": "555"}),
        )
        .await
        .unwrap();
        assert_eq!(out, json!({"name": "Ada"}));
    }

    #[tokio::test]
    async fn transform_errors_propagate() {
        let decision = decide(vec![
            Rule::allow().transform_async(|_, _| async { Err(PolicyError::transform("bad payload")) }),
        ])
        .await;
        let err = apply_result_transform(&decision, json!({})).await.unwrap_err();
        assert!(matches!(err, PolicyError::Transform(_)));
    }

    #[tokio::test]
    async fn explanation_lists_applied_rules() {
        let mut rule = Rule::deny().describe("suspended account");
        rule.policy_id = Some(PolicyId::new("profile.privacy"));
        let decision = decide(vec![rule]).await;

        let explained = serde_json::to_value(decision.explain()).unwrap();
        assert_eq!(explained["effect"], json!("DENY"));
        assert_eq!(explained["action"], json!("get"));
        assert_eq!(explained["applied_rules"][0]["description"], json!("suspended account"));
        assert_eq!(explained["applied_rules"][0]["policy_id"], json!("profile.privacy"));
    }

    #[derive(Default)]
    struct FakeRequest {
        metadata: HashMap<String, Decision>,
        properties: HashMap<String, Decision>,
    }

    impl DecisionCarrier for FakeRequest {
        fn decision_metadata(&self, key: &str) -> Option<&Decision> {
            self.metadata.get(key)
        }

        fn decision_property(&self, name: &str) -> Option<&Decision> {
            self.properties.get(name)
        }
    }

    #[tokio::test]
    async fn resolution_prefers_metadata_then_property() {
        let allow = decide(vec![Rule::allow()]).await;
        let deny = decide(vec![]).await;

        let mut request = FakeRequest::default();
        assert!(resolve_decision_from_request(&request).is_none());

        request.properties.insert(DECISION_PROPERTY.to_string(), deny);
        assert!(resolve_decision_from_request(&request).unwrap().is_denied());

        request.metadata.insert(DECISION_METADATA_KEY.to_string(), allow);
        assert!(resolve_decision_from_request(&request).unwrap().is_allowed());
    }
}
