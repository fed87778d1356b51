use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use gatehouse_auth::Subject;
use gatehouse_core::{EntityMetadata, EntityName, PolicyError, PolicyResult};
use gatehouse_guard::{AccessError, AccessGuard, MissingPolicy, RequestContext};
use gatehouse_policy::{
    Action, CacheConfig, HookContext, OwnerScope, PolicyRegistry, PolicySubscriber, RouteType, Rule,
    RuleOptions, RuleResult, Scope, Subscription,
};

/// Allows GET with a fixed scope.
struct FixedScope(Value);

#[async_trait]
impl PolicySubscriber for FixedScope {
    async fn on_before_get(&self, _ctx: &HookContext) -> PolicyResult<RuleResult> {
        let filter = self.0.clone();
        Ok(Rule::allow()
            .scoped(move |_| Scope::try_from(filter.clone()).unwrap_or_default())
            .into())
    }
}

/// Owners read their own rows; suspended subjects are denied outright;
/// everyone but admins gets `email` stripped.
struct Profiles;

#[async_trait]
impl PolicySubscriber for Profiles {
    async fn on_before_get(&self, ctx: &HookContext) -> PolicyResult<RuleResult> {
        let kit = ctx.rules();
        Ok(vec![
            Some(
                Rule::deny()
                    .when(|ctx| ctx.subject.attribute("suspended") == Some(&json!(true)))
                    .describe("suspended"),
            ),
            Some(kit.scope_to_owner("owner", RuleOptions::new(), OwnerScope::default())),
            Some(Rule::allow().when(|ctx| !ctx.subject.has_role("admin")).transform(
                |mut payload, _| {
                    if let Some(obj) = payload.as_object_mut() {
                        obj.remove("email");
                    }
                    payload
                },
            )),
        ]
        .into())
    }

    async fn on_before_delete(&self, ctx: &HookContext) -> PolicyResult<RuleResult> {
        Ok(ctx
            .rules()
            .allow_for_roles(["admin"], RuleOptions::new().describe("admins only"))
            .into())
    }

    async fn custom_action_rule(&self, action: &str, _ctx: &HookContext) -> PolicyResult<RuleResult> {
        match action {
            "export" => Err(PolicyError::hook("profile.rules", "export rules unavailable")),
            _ => Ok(RuleResult::None),
        }
    }
}

fn get() -> Action {
    Action::Route(RouteType::Get)
}

fn profiles_guard(missing: MissingPolicy) -> anyhow::Result<AccessGuard> {
    let registry = PolicyRegistry::new();
    registry.describe_entity(EntityMetadata::new("Profile").with_relation("owner"))?;
    registry.register_subscriber(Subscription::new("Profile", "profile.rules", Profiles))?;
    Ok(AccessGuard::new(Arc::new(registry), missing))
}

#[tokio::test]
async fn aggregated_scopes_reach_downstream_filter() -> anyhow::Result<()> {
    gatehouse_observability::init();

    let registry = PolicyRegistry::new();
    registry.register_subscriber(
        Subscription::new("E", "A", FixedScope(json!({"ownerId": "owner-2"}))).with_priority(1),
    )?;
    registry.register_subscriber(
        Subscription::new("E", "B", FixedScope(json!({"id": "entity-1"}))).with_priority(10),
    )?;
    let guard = AccessGuard::new(Arc::new(registry), MissingPolicy::Deny);

    let mut request = RequestContext::for_subject(Subject::new("u-1"));
    let decision = guard
        .authorize(&mut request, &EntityName::new("E"), &get(), None)
        .await?
        .expect("policy exists");

    assert!(decision.is_allowed());
    assert_eq!(decision.applied_rules[0].policy_id.as_ref().map(|p| p.as_str()), Some("B"));
    assert_eq!(
        decision.policy_ids.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        vec!["B", "A"]
    );

    let base = Scope::field("archived", false).filter;
    let filter = guard.scoped_filter(&request, &base);
    assert_eq!(
        Value::Object(filter),
        json!({"archived": false, "id": "entity-1", "ownerId": "owner-2"})
    );
    Ok(())
}

#[tokio::test]
async fn owner_relation_scope_and_redaction() -> anyhow::Result<()> {
    let guard = profiles_guard(MissingPolicy::Deny)?;
    let mut request = RequestContext::for_subject(Subject::new("u-7").with_role("member"));

    guard
        .authorize(&mut request, &EntityName::new("Profile"), &get(), None)
        .await?;

    let filter = guard.scoped_filter(&request, &Default::default());
    assert_eq!(Value::Object(filter), json!({"owner": {"id": "u-7"}}));

    let out = guard
        .finish(&request, json!({"name": "Ada", "email": "ada@example.com"}))
        .await?;
    assert_eq!(out, json!({"name": "Ada"}));
    Ok(())
}

#[tokio::test]
async fn admins_keep_full_payload() -> anyhow::Result<()> {
    let guard = profiles_guard(MissingPolicy::Deny)?;
    let mut request = RequestContext::for_subject(Subject::new("root").with_role("admin"));

    guard
        .authorize(&mut request, &EntityName::new("Profile"), &get(), None)
        .await?;

    let payload = json!({"name": "Ada", "email": "ada@example.com"});
    assert_eq!(guard.finish(&request, payload.clone()).await?, payload);
    Ok(())
}

#[tokio::test]
async fn deny_rule_rejects_and_attaches_nothing() -> anyhow::Result<()> {
    let guard = profiles_guard(MissingPolicy::Deny)?;
    let mut request =
        RequestContext::for_subject(Subject::new("u-7").with_attribute("suspended", true));

    let err = guard
        .authorize(&mut request, &EntityName::new("Profile"), &get(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Forbidden { .. }));
    assert!(err.is_denial());

    // Nothing attached: finishing is the identity.
    let payload = json!({"email": "x@example.com"});
    assert_eq!(guard.finish(&request, payload.clone()).await?, payload);
    Ok(())
}

#[tokio::test]
async fn no_matching_rule_is_forbidden() -> anyhow::Result<()> {
    let guard = profiles_guard(MissingPolicy::Allow)?;
    let mut request = RequestContext::for_subject(Subject::new("u-7").with_role("member"));

    let err = guard
        .authorize(
            &mut request,
            &EntityName::new("Profile"),
            &Action::Route(RouteType::Delete),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Forbidden { .. }));
    Ok(())
}

#[tokio::test]
async fn missing_policy_follows_guard_setting() -> anyhow::Result<()> {
    let subject = Subject::new("u-1");
    let invoice = EntityName::new("Invoice");

    let lenient = profiles_guard(MissingPolicy::Allow)?;
    let mut request = RequestContext::for_subject(subject.clone());
    assert!(lenient.authorize(&mut request, &invoice, &get(), None).await?.is_none());

    let strict = profiles_guard(MissingPolicy::Deny)?;
    let mut request = RequestContext::for_subject(subject);
    let err = strict
        .authorize(&mut request, &invoice, &get(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::NoPolicy { .. }));
    Ok(())
}

#[tokio::test]
async fn hook_failures_surface_as_policy_errors() -> anyhow::Result<()> {
    let guard = profiles_guard(MissingPolicy::Deny)?;
    let mut request = RequestContext::for_subject(Subject::new("u-1"));

    let err = guard
        .authorize(&mut request, &EntityName::new("Profile"), &"export".parse::<Action>()?, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Policy(PolicyError::Hook { .. })));
    assert!(!err.is_denial());
    Ok(())
}

/// Grants GET only to admins: through the hook subject when it is shared,
/// otherwise through an evaluation-time condition.
#[derive(Default)]
struct AdminReads {
    calls: AtomicUsize,
}

#[async_trait]
impl PolicySubscriber for AdminReads {
    async fn on_before_get(&self, ctx: &HookContext) -> PolicyResult<RuleResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(match &ctx.subject {
            Some(subject) if subject.has_role("admin") => RuleResult::from(Rule::allow()),
            Some(_) => RuleResult::from(Rule::deny()),
            None => RuleResult::from(Rule::allow().when(|ctx| ctx.subject.has_role("admin"))),
        })
    }
}

async fn effects_for_admin_then_guest(guard: &AccessGuard) -> Vec<bool> {
    let mut allowed = Vec::new();
    for subject in [Subject::new("root").with_role("admin"), Subject::new("guest")] {
        let mut request = RequestContext::for_subject(subject);
        let outcome = guard
            .authorize(&mut request, &EntityName::new("Report"), &get(), None)
            .await;
        allowed.push(outcome.is_ok());
    }
    allowed
}

fn cached_registry(hook: Arc<AdminReads>) -> anyhow::Result<Arc<PolicyRegistry>> {
    let registry = PolicyRegistry::new();
    registry.configure_cache(CacheConfig::enabled())?;
    registry.register_subscriber(Subscription::from_arc("Report", "report.admins", hook))?;
    Ok(Arc::new(registry))
}

#[tokio::test]
async fn cached_aggregates_are_shared_across_subjects() -> anyhow::Result<()> {
    let hook = Arc::new(AdminReads::default());
    let guard = AccessGuard::new(cached_registry(hook.clone())?, MissingPolicy::Deny);

    assert_eq!(effects_for_admin_then_guest(&guard).await, vec![true, false]);
    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn subject_in_hooks_never_reuses_another_subjects_rules() -> anyhow::Result<()> {
    let hook = Arc::new(AdminReads::default());
    let guard =
        AccessGuard::new(cached_registry(hook.clone())?, MissingPolicy::Deny).with_subject_in_hooks();

    assert_eq!(effects_for_admin_then_guest(&guard).await, vec![true, false]);
    assert_eq!(hook.calls.load(Ordering::SeqCst), 2);
    Ok(())
}
