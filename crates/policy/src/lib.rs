//! `gatehouse-policy`: policy aggregation and access decisions.
//!
//! Subscribers register rule-producing hooks per entity; the registry merges
//! them into one ordered [`Policy`] per (entity, action); the engine turns a
//! policy plus a subject into a [`Decision`]. No IO of its own: every async
//! boundary is host-supplied code.

pub mod action;
pub mod builders;
pub mod cache;
pub mod config;
pub mod context;
pub mod decision;
pub mod engine;
pub mod executor;
pub mod registry;
pub mod rule;
pub mod scope;
pub mod subscriber;

pub use action::{Action, RouteType};
pub use builders::{OwnerScope, RuleKit, RuleOptions, allow, allow_for_roles, deny, scope_to_owner};
pub use cache::{CacheEntry, CacheKey, PolicyCache};
pub use config::CacheConfig;
pub use context::{AggregationOptions, HookContext};
pub use decision::{
    DECISION_METADATA_KEY, DECISION_PROPERTY, Decision, DecisionCarrier, DecisionExplanation,
    apply_result_transform, attach_decision_to_resource, resolve_decision_from_request,
};
pub use engine::{DecisionEngine, EvaluationRequest};
pub use executor::PolicyExecutor;
pub use registry::{Policy, PolicyRegistry};
pub use rule::{ConditionFn, Effect, EvalContext, Rule, RuleResult, ScopeFn, TransformFn};
pub use scope::{FilterExpr, Scope, merge_where};
pub use subscriber::{PolicySubscriber, Subscription, SubscriptionCacheOptions};
