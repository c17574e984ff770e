//! In-memory [`LockService`] backed by [`DashMap`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gatehouse_core::clock::deadline_after;
use gatehouse_core::{ClockSource, SystemClock};
use uuid::Uuid;

use super::{Lease, LockError, LockService};

/// Process-local lease table.
///
/// Each acquisition mints a fresh holder token. An expired lease is
/// reclaimable by the next acquirer, and a release only removes the lease
/// it was given, never a successor's.
pub struct InMemoryLockService {
    leases: DashMap<String, Lease>,
    ttl: Duration,
    clock: Arc<dyn ClockSource>,
}

impl InMemoryLockService {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            leases: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Number of leases currently recorded, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    fn mint(&self, name: &str, now: u64) -> Lease {
        Lease {
            name: name.to_string(),
            holder: Uuid::new_v4().to_string(),
            expires_at_ms: deadline_after(now, self.ttl),
            ttl: self.ttl,
        }
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn acquire(&self, name: &str) -> Result<Lease, LockError> {
        let now = self.clock.now_millis();
        match self.leases.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired_at(now) {
                    return Err(LockError::Held {
                        name: name.to_string(),
                    });
                }
                let lease = self.mint(name, now);
                occupied.insert(lease.clone());
                Ok(lease)
            }
            Entry::Vacant(vacant) => {
                let lease = self.mint(name, now);
                vacant.insert(lease.clone());
                Ok(lease)
            }
        }
    }

    async fn release(&self, lease: &Lease) -> Result<(), LockError> {
        self.leases
            .remove_if(&lease.name, |_, current| current.holder == lease.holder);
        Ok(())
    }

    async fn renew(&self, lease: &Lease) -> Result<Lease, LockError> {
        let lost = || LockError::Lost {
            name: lease.name.clone(),
        };
        let mut current = self.leases.get_mut(&lease.name).ok_or_else(lost)?;
        if current.holder != lease.holder {
            return Err(lost());
        }
        current.expires_at_ms = deadline_after(self.clock.now_millis(), current.ttl);
        Ok(current.value().clone())
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.leases.len();
        self.leases.retain(|_, lease| !lease.is_expired_at(now));
        before.saturating_sub(self.leases.len())
    }
}
