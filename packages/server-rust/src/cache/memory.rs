//! In-memory [`CacheStore`] backed by [`DashMap`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use gatehouse_core::{ClockSource, SystemClock};

use super::{CacheEntry, CacheError, CacheStore};

/// Process-local response cache.
///
/// Readers never see an expired entry: expiry is checked on every `get`,
/// and expired entries are removed lazily there or by [`purge_expired`].
///
/// [`purge_expired`]: CacheStore::purge_expired
pub struct InMemoryCacheStore {
    entries: DashMap<String, Arc<CacheEntry>>,
    clock: Arc<dyn ClockSource>,
}

impl InMemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of stored entries, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry>>, CacheError> {
        let now = self.clock.now_millis();
        // Clone out of the shard guard before any removal touches the same shard.
        let found = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        match found {
            Some(entry) if !entry.is_expired_at(now) => Ok(Some(entry)),
            Some(_) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry, _ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), Arc::new(entry));
        Ok(())
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }
}
