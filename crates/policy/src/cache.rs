//! Aggregated rule cache with epoch-based invalidation.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use gatehouse_core::{EntityName, PolicyResult};

use crate::action::Action;
use crate::rule::Rule;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity: EntityName,
    pub action: Action,
}

impl CacheKey {
    pub fn new(entity: EntityName, action: Action) -> Self {
        Self { entity, action }
    }
}

/// Aggregated rules for one (entity, action) pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub rules: Vec<Rule>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Registry epoch the rules were built under.
    pub epoch: u64,
}

impl CacheEntry {
    pub fn is_live(&self, epoch: u64, now: DateTime<Utc>) -> bool {
        self.epoch == epoch && self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-memory rule cache.
///
/// Every entry records the epoch it was built under; bumping the epoch
/// invalidates all entries at once regardless of expiry. Dead entries are
/// evicted lazily on lookup.
#[derive(Debug, Default)]
pub struct PolicyCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    epoch: AtomicU64,
}

impl PolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Invalidate every entry. Returns the new epoch.
    pub fn bump(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> PolicyResult<Option<Vec<Rule>>> {
        let epoch = self.epoch();
        {
            let entries = self.entries.read()?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(epoch, now) => return Ok(Some(entry.rules.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write()?;
        if entries.get(key).is_some_and(|e| !e.is_live(epoch, now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    /// Store an entry unless the epoch moved since it was built.
    ///
    /// Returns whether the entry was stored.
    pub fn store(&self, key: CacheKey, entry: CacheEntry) -> PolicyResult<bool> {
        let mut entries = self.entries.write()?;
        if entry.epoch != self.epoch() {
            return Ok(false);
        }
        entries.insert(key, entry);
        Ok(true)
    }

    pub fn clear(&self) -> PolicyResult<()> {
        self.entries.write()?.clear();
        Ok(())
    }

    pub fn len(&self) -> PolicyResult<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> PolicyResult<bool> {
        Ok(self.len()? == 0)
    }
}
