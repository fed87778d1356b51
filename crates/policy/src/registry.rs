//! Subscription registry and policy aggregation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use tracing::{debug, info};

use gatehouse_core::{
    Clock, EntityMetadata, EntityName, PolicyError, PolicyId, PolicyResult, SystemClock,
};

use crate::action::Action;
use crate::cache::{CacheEntry, CacheKey, PolicyCache};
use crate::config::CacheConfig;
use crate::context::{AggregationOptions, HookContext};
use crate::executor::PolicyExecutor;
use crate::rule::Rule;
use crate::subscriber::Subscription;

/// Aggregated, ordered rule set for one (entity, action) pair.
#[derive(Debug, Clone)]
pub struct Policy {
    pub action: Action,
    pub entity: EntityName,
    /// Derived id: `<entity lowercase>.policy`.
    pub policy_id: PolicyId,
    /// Every subscription registered for the entity, in evaluation order,
    /// including those that contributed no rules for this action.
    pub policy_ids: Vec<PolicyId>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Kept sorted by priority (descending, stable).
    subscriptions: HashMap<EntityName, Vec<Arc<Subscription>>>,
    metadata: HashMap<EntityName, Arc<EntityMetadata>>,
    cache_config: CacheConfig,
}

/// Holds subscriptions per entity and aggregates their rules into policies.
///
/// Safe to share across in-flight requests (`Arc<PolicyRegistry>`). Writes
/// (`register_subscriber`, `configure_cache`, `clear`) are expected to be rare;
/// no lock is held while hooks run.
#[derive(Debug)]
pub struct PolicyRegistry {
    state: RwLock<RegistryState>,
    cache: PolicyCache,
    executor: PolicyExecutor,
    clock: Arc<dyn Clock>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            cache: PolicyCache::new(),
            executor: PolicyExecutor::new(),
            clock,
        }
    }

    /// Add a subscription for its entity. Invalidates every cached aggregate.
    pub fn register_subscriber(&self, subscription: Subscription) -> PolicyResult<()> {
        let mut state = self.state.write()?;

        let entity = subscription.entity.clone();
        let policy_id = subscription.policy_id.clone();
        let priority = subscription.priority;

        let list = state.subscriptions.entry(entity.clone()).or_default();
        // After every existing subscription of equal or higher priority.
        let at = list.partition_point(|s| s.priority >= priority);
        list.insert(at, Arc::new(subscription));

        let epoch = self.cache.bump();
        info!(%entity, %policy_id, priority, epoch, "policy subscriber registered");
        Ok(())
    }

    /// Register relation metadata handed to hooks for `metadata.entity`.
    pub fn describe_entity(&self, metadata: EntityMetadata) -> PolicyResult<()> {
        let mut state = self.state.write()?;
        state
            .metadata
            .insert(metadata.entity.clone(), Arc::new(metadata));
        self.cache.bump();
        Ok(())
    }

    /// Replace the cache settings. Entries built under the previous settings
    /// (and their expiry) are discarded.
    pub fn configure_cache(&self, config: CacheConfig) -> PolicyResult<()> {
        let mut state = self.state.write()?;
        state.cache_config = config;
        self.cache.bump();
        self.cache.clear()?;
        info!(enabled = config.enabled, ttl = ?config.ttl, "policy cache configured");
        Ok(())
    }

    pub fn cache_config(&self) -> PolicyResult<CacheConfig> {
        Ok(self.state.read()?.cache_config)
    }

    /// Drop every cached aggregate without touching subscriptions.
    pub fn invalidate(&self) -> u64 {
        self.cache.bump()
    }

    /// Drop all subscriptions, entity metadata and cached aggregates.
    pub fn clear(&self) -> PolicyResult<()> {
        let mut state = self.state.write()?;
        state.subscriptions.clear();
        state.metadata.clear();
        self.cache.bump();
        self.cache.clear()?;
        info!("policy registry cleared");
        Ok(())
    }

    /// Registered subscriptions for `entity`, in evaluation order.
    pub fn subscriptions(&self, entity: &EntityName) -> PolicyResult<Vec<Arc<Subscription>>> {
        let state = self.state.read()?;
        Ok(state.subscriptions.get(entity).cloned().unwrap_or_default())
    }

    /// Build the aggregated policy for (entity, action).
    ///
    /// Returns `Ok(None)` when no subscription exists for `entity`: that is
    /// "no policy configured", not an empty policy, and the caller decides how
    /// to treat it. A hook failure fails the whole call.
    pub async fn build_aggregated_policy(
        &self,
        entity: &EntityName,
        action: &Action,
        options: &AggregationOptions,
    ) -> PolicyResult<Option<Policy>> {
        // Capture the epoch before snapshotting so a concurrent registration
        // can only make the result uncacheable, never stale.
        let epoch = self.cache.epoch();

        let (subscriptions, metadata, config) = {
            let state = self.state.read()?;
            let subscriptions = match state.subscriptions.get(entity) {
                Some(list) if !list.is_empty() => list.clone(),
                _ => {
                    debug!(%entity, %action, "no policy subscribers");
                    return Ok(None);
                }
            };
            (
                subscriptions,
                state.metadata.get(entity).cloned(),
                state.cache_config,
            )
        };

        let key = CacheKey::new(entity.clone(), action.clone());
        let now = self.clock.now();

        // Hooks that see a subject or request data may emit per-request rule
        // sets; those never go through the (entity, action) cache.
        let cacheable = config.enabled && !options.is_request_specific();
        if config.enabled && !cacheable {
            debug!(%entity, %action, "request-specific aggregation; cache skipped");
        }

        let cached = if cacheable {
            self.cache.get(&key, now)?
        } else {
            None
        };

        let rules = match cached {
            Some(rules) => {
                debug!(%entity, %action, rules = rules.len(), "policy cache hit");
                rules
            }
            None => {
                let rules = self
                    .aggregate(&subscriptions, entity, action, metadata, options)
                    .await?;
                if cacheable {
                    self.store(key, &subscriptions, &rules, &config, epoch)?;
                }
                rules
            }
        };

        Ok(Some(Policy {
            action: action.clone(),
            entity: entity.clone(),
            policy_id: PolicyId::default_for(entity),
            policy_ids: subscriptions.iter().map(|s| s.policy_id.clone()).collect(),
            rules,
        }))
    }

    /// Run every subscription's hook concurrently; concatenate in priority order.
    ///
    /// Every hook runs to completion. When several fail, the error of the
    /// highest-priority failing subscription is returned.
    async fn aggregate(
        &self,
        subscriptions: &[Arc<Subscription>],
        entity: &EntityName,
        action: &Action,
        metadata: Option<Arc<EntityMetadata>>,
        options: &AggregationOptions,
    ) -> PolicyResult<Vec<Rule>> {
        let executor = self.executor;

        let calls = subscriptions.iter().map(|subscription| {
            let ctx = HookContext::new(entity.clone(), action.clone(), subscription.policy_id.clone())
                .with_metadata(metadata.clone())
                .with_options(options);

            async move {
                let rules = executor
                    .execute(subscription.subscriber.as_ref(), action, &ctx)
                    .await?;
                Ok::<_, PolicyError>(
                    rules
                        .into_iter()
                        .map(|rule| rule.with_policy_id(subscription.policy_id.clone()))
                        .collect::<Vec<_>>(),
                )
            }
        });

        // `join_all` yields results in input (priority) order.
        let mut rules = Vec::new();
        for result in join_all(calls).await {
            rules.extend(result?);
        }

        debug!(
            %entity,
            %action,
            subscriptions = subscriptions.len(),
            rules = rules.len(),
            "policy aggregated"
        );
        Ok(rules)
    }

    fn store(
        &self,
        key: CacheKey,
        subscriptions: &[Arc<Subscription>],
        rules: &[Rule],
        config: &CacheConfig,
        epoch: u64,
    ) -> PolicyResult<()> {
        if subscriptions.iter().any(|s| s.bypasses_cache()) {
            debug!(entity = %key.entity, action = %key.action, "policy cache bypassed");
            return Ok(());
        }

        let ttl = subscriptions
            .iter()
            .filter_map(|s| s.cache_ttl())
            .chain(config.ttl)
            .min();

        let expires_at = match ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| PolicyError::invalid_config(format!("cache ttl: {e}")))?;
                Some(self.clock.now() + ttl)
            }
            None => None,
        };

        let entity = key.entity.clone();
        let action = key.action.clone();
        let stored = self.cache.store(
            key,
            CacheEntry {
                rules: rules.to_vec(),
                expires_at,
                epoch,
            },
        )?;
        debug!(%entity, %action, stored, epoch, "policy cache store");
        Ok(())
    }
}
