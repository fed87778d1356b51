//! Rules: the unit of evaluation.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use gatehouse_auth::Subject;
use gatehouse_core::{PolicyId, PolicyResult};

use crate::scope::Scope;

/// Outcome a rule contributes when its condition passes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    Allow,
    Deny,
}

impl core::fmt::Display for Effect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Effect::Allow => f.write_str("ALLOW"),
            Effect::Deny => f.write_str("DENY"),
        }
    }
}

/// Evaluation-time inputs handed to conditions, scopes and transforms.
///
/// Cheap to clone. This is the only request state a rule may depend on: the
/// same (possibly cached) rule is evaluated against many subjects.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub subject: Arc<Subject>,
    pub resource: Option<Arc<Value>>,
}

impl EvalContext {
    pub fn new(subject: Arc<Subject>, resource: Option<Arc<Value>>) -> Self {
        Self { subject, resource }
    }

    pub fn resource(&self) -> Option<&Value> {
        self.resource.as_deref()
    }
}

pub type ConditionFn =
    Arc<dyn Fn(EvalContext) -> BoxFuture<'static, PolicyResult<bool>> + Send + Sync>;
pub type ScopeFn =
    Arc<dyn Fn(EvalContext) -> BoxFuture<'static, PolicyResult<Scope>> + Send + Sync>;
pub type TransformFn =
    Arc<dyn Fn(Value, EvalContext) -> BoxFuture<'static, PolicyResult<Value>> + Send + Sync>;

/// Wrap a synchronous predicate.
pub fn condition<F>(f: F) -> ConditionFn
where
    F: Fn(&EvalContext) -> bool + Send + Sync + 'static,
{
    Arc::new(move |ctx: EvalContext| -> BoxFuture<'static, PolicyResult<bool>> {
        future::ready(Ok(f(&ctx))).boxed()
    })
}

/// Wrap an asynchronous, fallible predicate.
pub fn condition_async<F, Fut>(f: F) -> ConditionFn
where
    F: Fn(EvalContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PolicyResult<bool>> + Send + 'static,
{
    Arc::new(move |ctx: EvalContext| -> BoxFuture<'static, PolicyResult<bool>> {
        f(ctx).boxed()
    })
}

pub fn scope_fn<F>(f: F) -> ScopeFn
where
    F: Fn(&EvalContext) -> Scope + Send + Sync + 'static,
{
    Arc::new(move |ctx: EvalContext| -> BoxFuture<'static, PolicyResult<Scope>> {
        future::ready(Ok(f(&ctx))).boxed()
    })
}

pub fn scope_fn_async<F, Fut>(f: F) -> ScopeFn
where
    F: Fn(EvalContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PolicyResult<Scope>> + Send + 'static,
{
    Arc::new(move |ctx: EvalContext| -> BoxFuture<'static, PolicyResult<Scope>> {
        f(ctx).boxed()
    })
}

pub fn transform_fn<F>(f: F) -> TransformFn
where
    F: Fn(Value, &EvalContext) -> Value + Send + Sync + 'static,
{
    Arc::new(
        move |payload: Value, ctx: EvalContext| -> BoxFuture<'static, PolicyResult<Value>> {
            future::ready(Ok(f(payload, &ctx))).boxed()
        },
    )
}

pub fn transform_fn_async<F, Fut>(f: F) -> TransformFn
where
    F: Fn(Value, EvalContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PolicyResult<Value>> + Send + 'static,
{
    Arc::new(
        move |payload: Value, ctx: EvalContext| -> BoxFuture<'static, PolicyResult<Value>> {
            f(payload, ctx).boxed()
        },
    )
}

/// One evaluable access unit.
///
/// `policy_id` is assigned by the registry when the rule is aggregated; any
/// value set by a subscriber is overwritten. `priority` is advisory only and
/// never reorders rules across subscriptions.
#[derive(Clone)]
pub struct Rule {
    pub effect: Effect,
    pub condition: Option<ConditionFn>,
    pub scope: Option<ScopeFn>,
    pub result_transform: Option<TransformFn>,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub policy_id: Option<PolicyId>,
}

impl Rule {
    pub fn new(effect: Effect) -> Self {
        Self {
            effect,
            condition: None,
            scope: None,
            result_transform: None,
            description: None,
            priority: None,
            policy_id: None,
        }
    }

    pub fn allow() -> Self {
        Self::new(Effect::Allow)
    }

    pub fn deny() -> Self {
        Self::new(Effect::Deny)
    }

    pub fn when<F>(mut self, f: F) -> Self
    where
        F: Fn(&EvalContext) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(condition(f));
        self
    }

    pub fn when_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(EvalContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PolicyResult<bool>> + Send + 'static,
    {
        self.condition = Some(condition_async(f));
        self
    }

    pub fn scoped<F>(mut self, f: F) -> Self
    where
        F: Fn(&EvalContext) -> Scope + Send + Sync + 'static,
    {
        self.scope = Some(scope_fn(f));
        self
    }

    pub fn scoped_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(EvalContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PolicyResult<Scope>> + Send + 'static,
    {
        self.scope = Some(scope_fn_async(f));
        self
    }

    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &EvalContext) -> Value + Send + Sync + 'static,
    {
        self.result_transform = Some(transform_fn(f));
        self
    }

    pub fn transform_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value, EvalContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PolicyResult<Value>> + Send + 'static,
    {
        self.result_transform = Some(transform_fn_async(f));
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub(crate) fn with_policy_id(mut self, policy_id: PolicyId) -> Self {
        self.policy_id = Some(policy_id);
        self
    }

    /// A rule without a condition always matches.
    pub async fn matches(&self, ctx: &EvalContext) -> PolicyResult<bool> {
        match &self.condition {
            Some(condition) => condition(ctx.clone()).await,
            None => Ok(true),
        }
    }
}

impl core::fmt::Debug for Rule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rule")
            .field("effect", &self.effect)
            .field("description", &self.description)
            .field("priority", &self.priority)
            .field("policy_id", &self.policy_id)
            .field("has_condition", &self.condition.is_some())
            .field("has_scope", &self.scope.is_some())
            .field("has_result_transform", &self.result_transform.is_some())
            .finish()
    }
}

/// What a subscriber hook may return: nothing, one rule, or a list with holes.
#[derive(Debug, Clone, Default)]
pub enum RuleResult {
    #[default]
    None,
    One(Rule),
    Many(Vec<Option<Rule>>),
}

impl RuleResult {
    /// Normalize into a flat rule list, dropping empty entries.
    pub fn into_rules(self) -> Vec<Rule> {
        match self {
            RuleResult::None => Vec::new(),
            RuleResult::One(rule) => vec![rule],
            RuleResult::Many(rules) => rules.into_iter().flatten().collect(),
        }
    }
}

impl From<Rule> for RuleResult {
    fn from(value: Rule) -> Self {
        RuleResult::One(value)
    }
}

impl From<Option<Rule>> for RuleResult {
    fn from(value: Option<Rule>) -> Self {
        match value {
            Some(rule) => RuleResult::One(rule),
            None => RuleResult::None,
        }
    }
}

impl From<Vec<Rule>> for RuleResult {
    fn from(value: Vec<Rule>) -> Self {
        RuleResult::Many(value.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<Rule>>> for RuleResult {
    fn from(value: Vec<Option<Rule>>) -> Self {
        RuleResult::Many(value)
    }
}
