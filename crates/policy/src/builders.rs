//! Convenience constructors for subscriber hooks.
//!
//! Pure rule builders: nothing here evaluates anything.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};

use gatehouse_auth::Role;
use gatehouse_core::{EntityMetadata, PolicyResult};

use crate::rule::{ConditionFn, Effect, EvalContext, Rule, ScopeFn, TransformFn};
use crate::scope::Scope;

/// Extra fields layered onto a helper-built rule.
#[derive(Clone, Default)]
pub struct RuleOptions {
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub condition: Option<ConditionFn>,
    pub scope: Option<ScopeFn>,
    pub result_transform: Option<TransformFn>,
}

impl RuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn when<F>(mut self, f: F) -> Self
    where
        F: Fn(&EvalContext) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(crate::rule::condition(f));
        self
    }

    pub fn scoped<F>(mut self, f: F) -> Self
    where
        F: Fn(&EvalContext) -> Scope + Send + Sync + 'static,
    {
        self.scope = Some(crate::rule::scope_fn(f));
        self
    }

    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &EvalContext) -> Value + Send + Sync + 'static,
    {
        self.result_transform = Some(crate::rule::transform_fn(f));
        self
    }

    fn into_rule(self, effect: Effect) -> Rule {
        let mut rule = Rule::new(effect);
        rule.description = self.description;
        rule.priority = self.priority;
        rule.condition = self.condition;
        rule.scope = self.scope;
        rule.result_transform = self.result_transform;
        rule
    }
}

impl core::fmt::Debug for RuleOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RuleOptions")
            .field("description", &self.description)
            .field("priority", &self.priority)
            .field("has_condition", &self.condition.is_some())
            .field("has_scope", &self.scope.is_some())
            .field("has_result_transform", &self.result_transform.is_some())
            .finish()
    }
}

/// How an owner field is shaped in the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerScope {
    /// `Some(true)`: `{field: {id: ..}}`; `Some(false)`: `{field: ..}`;
    /// `None`: infer from entity metadata (plain field when unknown).
    pub is_relation: Option<bool>,
}

impl OwnerScope {
    pub fn relation() -> Self {
        Self {
            is_relation: Some(true),
        }
    }

    pub fn column() -> Self {
        Self {
            is_relation: Some(false),
        }
    }
}

pub fn allow(options: RuleOptions) -> Vec<Rule> {
    vec![options.into_rule(Effect::Allow)]
}

pub fn deny(options: RuleOptions) -> Vec<Rule> {
    vec![options.into_rule(Effect::Deny)]
}

/// ALLOW when the subject holds any of `roles` (and `options.condition`, if set).
pub fn allow_for_roles<I, R>(roles: I, mut options: RuleOptions) -> Rule
where
    I: IntoIterator<Item = R>,
    R: Into<Role>,
{
    let roles: Arc<[Role]> = roles.into_iter().map(Into::into).collect();
    let extra = options.condition.take();

    options.condition = Some(Arc::new(
        move |ctx: EvalContext| -> BoxFuture<'static, PolicyResult<bool>> {
            let roles = roles.clone();
            let extra = extra.clone();
            async move {
                if !ctx.subject.has_any_role(roles.iter()) {
                    return Ok(false);
                }
                match extra {
                    Some(condition) => condition(ctx).await,
                    None => Ok(true),
                }
            }
            .boxed()
        },
    ));

    options.into_rule(Effect::Allow)
}

/// ALLOW scoped to rows owned by the evaluating subject.
///
/// The owner id is read from the evaluation-time subject, never from the
/// subject present when the rule was built.
pub fn scope_to_owner(field: impl Into<String>, mut options: RuleOptions, owner: OwnerScope) -> Rule {
    let field: Arc<str> = Arc::from(field.into());
    let is_relation = owner.is_relation.unwrap_or(false);
    let extra = options.scope.take();

    options.scope = Some(Arc::new(
        move |ctx: EvalContext| -> BoxFuture<'static, PolicyResult<Scope>> {
            let id = ctx.subject.id.as_str().to_string();
            let owner_value = if is_relation {
                json!({ "id": id })
            } else {
                Value::String(id)
            };
            let owned = Scope::field(&*field, owner_value);
            let extra = extra.clone();
            async move {
                match extra {
                    Some(scope) => Ok(owned.merge(&scope(ctx).await?)),
                    None => Ok(owned),
                }
            }
            .boxed()
        },
    ));

    options.into_rule(Effect::Allow)
}

/// Rule helpers bound to an entity's metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleKit<'a> {
    metadata: Option<&'a EntityMetadata>,
}

impl<'a> RuleKit<'a> {
    pub fn new(metadata: Option<&'a EntityMetadata>) -> Self {
        Self { metadata }
    }

    pub fn allow(&self, options: RuleOptions) -> Vec<Rule> {
        allow(options)
    }

    pub fn deny(&self, options: RuleOptions) -> Vec<Rule> {
        deny(options)
    }

    pub fn allow_for_roles<I, R>(&self, roles: I, options: RuleOptions) -> Rule
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        allow_for_roles(roles, options)
    }

    /// Like [`scope_to_owner`], inferring `is_relation` from metadata when unset.
    pub fn scope_to_owner(&self, field: &str, options: RuleOptions, owner: OwnerScope) -> Rule {
        let is_relation = owner
            .is_relation
            .unwrap_or_else(|| self.metadata.is_some_and(|m| m.is_relation(field)));
        scope_to_owner(
            field,
            options,
            OwnerScope {
                is_relation: Some(is_relation),
            },
        )
    }
}
