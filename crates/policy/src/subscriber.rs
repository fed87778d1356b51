//! Subscriber hook interface and the subscription binding registered for it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gatehouse_core::{EntityName, PolicyId, PolicyResult};

use crate::context::HookContext;
use crate::rule::RuleResult;

/// Rule-producing hooks implemented by host business logic.
///
/// Every hook is optional: the provided implementations contribute no rules.
/// Route actions call the matching `on_before_*` hook; any other action calls
/// `custom_action_rule` with the raw action name.
#[async_trait]
pub trait PolicySubscriber: Send + Sync {
    async fn on_before_create(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
        Ok(RuleResult::None)
    }

    async fn on_before_get(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
        Ok(RuleResult::None)
    }

    async fn on_before_get_list(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
        Ok(RuleResult::None)
    }

    async fn on_before_update(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
        Ok(RuleResult::None)
    }

    async fn on_before_partial_update(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
        Ok(RuleResult::None)
    }

    async fn on_before_delete(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
        Ok(RuleResult::None)
    }

    async fn custom_action_rule(
        &self,
        _action: &str,
        _ctx: &HookContext,
    ) -> PolicyResult<RuleResult> {
        Ok(RuleResult::None)
    }
}

/// Per-subscription cache behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCacheOptions {
    /// Never cache aggregates this subscription contributes to.
    #[serde(default)]
    pub bypass: bool,
    /// Upper bound on the lifetime of aggregates this subscription contributes to.
    #[serde(default)]
    pub ttl: Option<Duration>,
}

impl SubscriptionCacheOptions {
    pub fn bypass() -> Self {
        Self {
            bypass: true,
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            bypass: false,
            ttl: Some(ttl),
        }
    }
}

/// A registered (entity, policy id, priority, hooks) binding.
#[derive(Clone)]
pub struct Subscription {
    pub entity: EntityName,
    pub policy_id: PolicyId,
    /// Higher runs first; ties keep registration order.
    pub priority: i32,
    pub subscriber: Arc<dyn PolicySubscriber>,
    pub cache_options: Option<SubscriptionCacheOptions>,
}

impl Subscription {
    pub fn new<S>(entity: impl Into<EntityName>, policy_id: impl Into<PolicyId>, subscriber: S) -> Self
    where
        S: PolicySubscriber + 'static,
    {
        Self::from_arc(entity, policy_id, Arc::new(subscriber))
    }

    pub fn from_arc(
        entity: impl Into<EntityName>,
        policy_id: impl Into<PolicyId>,
        subscriber: Arc<dyn PolicySubscriber>,
    ) -> Self {
        Self {
            entity: entity.into(),
            policy_id: policy_id.into(),
            priority: 0,
            subscriber,
            cache_options: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cache_options(mut self, options: SubscriptionCacheOptions) -> Self {
        self.cache_options = Some(options);
        self
    }

    pub(crate) fn bypasses_cache(&self) -> bool {
        self.cache_options.is_some_and(|o| o.bypass)
    }

    pub(crate) fn cache_ttl(&self) -> Option<Duration> {
        self.cache_options.and_then(|o| o.ttl)
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("entity", &self.entity)
            .field("policy_id", &self.policy_id)
            .field("priority", &self.priority)
            .field("cache_options", &self.cache_options)
            .finish_non_exhaustive()
    }
}
