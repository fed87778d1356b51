//! Hook dispatch and result normalization for a single subscription.

use tracing::trace;

use gatehouse_core::PolicyResult;

use crate::action::{Action, RouteType};
use crate::context::HookContext;
use crate::rule::Rule;
use crate::subscriber::PolicySubscriber;

/// Invokes the right hook of a subscriber and flattens its output into rules.
///
/// - No caching, no ordering: one subscriber, one call.
/// - Hook errors are returned as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyExecutor;

impl PolicyExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        subscriber: &dyn PolicySubscriber,
        action: &Action,
        ctx: &HookContext,
    ) -> PolicyResult<Vec<Rule>> {
        let result = match ctx.route_type.or_else(|| action.route_type()) {
            Some(RouteType::Create) => subscriber.on_before_create(ctx).await?,
            Some(RouteType::Get) => subscriber.on_before_get(ctx).await?,
            Some(RouteType::GetList) => subscriber.on_before_get_list(ctx).await?,
            Some(RouteType::Update) => subscriber.on_before_update(ctx).await?,
            Some(RouteType::PartialUpdate) => subscriber.on_before_partial_update(ctx).await?,
            Some(RouteType::Delete) => subscriber.on_before_delete(ctx).await?,
            None => {
                let name = action.to_string();
                subscriber.custom_action_rule(&name, ctx).await?
            }
        };

        let rules = result.into_rules();
        trace!(
            policy_id = %ctx.policy_id,
            action = %action,
            rules = rules.len(),
            "hook produced rules"
        );
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use gatehouse_core::{EntityName, PolicyError, PolicyId};

    use crate::rule::RuleResult;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    impl Recording {
        fn record(&self, hook: &str) {
            self.calls.lock().unwrap().push(hook.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PolicySubscriber for Recording {
        async fn on_before_create(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
            self.record("create");
            Ok(Rule::allow().into())
        }

        async fn on_before_get_list(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
            self.record("getList");
            Ok(vec![Some(Rule::allow()), None, Some(Rule::deny())].into())
        }

        async fn on_before_partial_update(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
            self.record("partialUpdate");
            Ok(RuleResult::None)
        }

        async fn custom_action_rule(
            &self,
            action: &str,
            _ctx: &HookContext,
        ) -> PolicyResult<RuleResult> {
            self.record(action);
            if action == "explode" {
                return Err(PolicyError::hook("orders.custom", "boom"));
            }
            Ok(Rule::deny().describe(action.to_string()).into())
        }
    }

    fn ctx(action: &Action) -> HookContext {
        HookContext::new(
            EntityName::new("Order"),
            action.clone(),
            PolicyId::new("orders.custom"),
        )
    }

    async fn run(subscriber: &Recording, action: Action) -> PolicyResult<Vec<Rule>> {
        PolicyExecutor::new()
            .execute(subscriber, &action, &ctx(&action))
            .await
    }

    #[tokio::test]
    async fn route_actions_dispatch_to_named_hooks() {
        let subscriber = Recording::default();

        assert_eq!(run(&subscriber, RouteType::Create.into()).await.unwrap().len(), 1);
        assert_eq!(run(&subscriber, RouteType::GetList.into()).await.unwrap().len(), 2);
        assert!(run(&subscriber, RouteType::PartialUpdate.into()).await.unwrap().is_empty());

        assert_eq!(subscriber.calls(), vec!["create", "getList", "partialUpdate"]);
    }

    #[tokio::test]
    async fn missing_route_hook_yields_no_rules() {
        let subscriber = Recording::default();
        let rules = run(&subscriber, RouteType::Delete.into()).await.unwrap();
        assert!(rules.is_empty());
        // Route actions never fall back to the custom hook.
        assert!(subscriber.calls().is_empty());
    }

    #[tokio::test]
    async fn custom_actions_receive_raw_name() {
        let subscriber = Recording::default();
        let rules = run(&subscriber, Action::custom("approve")).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].description.as_deref(), Some("approve"));
        assert_eq!(subscriber.calls(), vec!["approve"]);
    }

    #[tokio::test]
    async fn hook_errors_propagate() {
        let subscriber = Recording::default();
        let err = run(&subscriber, Action::custom("explode")).await.unwrap_err();
        assert!(matches!(err, PolicyError::Hook { .. }));
    }
}
