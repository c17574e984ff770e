//! Named mutual-exclusion leases serializing concurrent writers.
//!
//! A [`LockService`] hands out at most one live [`Lease`] per name. The
//! pipeline acquires through [`acquire_with_policy`], which returns a
//! [`LeaseGuard`] that releases the lease on every exit path; lease expiry
//! reclaims names whose holder vanished.

pub mod memory;

pub use memory::InMemoryLockService;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_core::ResourceKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::service::operation::{ApiRequest, PipelineError};

// ---------------------------------------------------------------------------
// Lease and service contract
// ---------------------------------------------------------------------------

/// Time-bounded ownership of a named lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub name: String,
    /// Opaque token identifying the holder; release only succeeds with it.
    pub holder: String,
    pub expires_at_ms: u64,
    /// Lifetime granted on acquisition and on every renewal.
    pub ttl: Duration,
}

impl Lease {
    #[must_use]
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// How often a holder renews: a third of the TTL, at least 1 ms.
    #[must_use]
    pub fn renew_interval(&self) -> Duration {
        (self.ttl / 3).max(Duration::from_millis(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("lock {name} is held by another request")]
    Held { name: String },
    #[error("lease on {name} was lost")]
    Lost { name: String },
    #[error("lock service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LockService: Send + Sync {
    /// Takes the lease for `name` if nobody holds a live one.
    async fn acquire(&self, name: &str) -> Result<Lease, LockError>;

    /// Gives the lease back. Releasing a lease that expired and was
    /// reclaimed by someone else is a no-op.
    async fn release(&self, lease: &Lease) -> Result<(), LockError>;

    /// Extends a lease the caller still holds by its TTL.
    ///
    /// Fails with `Lost` once the lease was released or reclaimed by
    /// another acquirer.
    async fn renew(&self, lease: &Lease) -> Result<Lease, LockError>;

    /// Drops expired leases and returns how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

// ---------------------------------------------------------------------------
// Acquisition policy
// ---------------------------------------------------------------------------

/// What to do when the lease is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// Report a lock conflict immediately.
    FailFast,
    /// Retry until the lease frees up or the wait budget runs out.
    #[default]
    Wait,
}

/// Acquires `name` according to `policy`.
///
/// # Errors
///
/// `LockConflict` when the lease stays held (immediately under
/// [`LockPolicy::FailFast`], after `max_wait` under [`LockPolicy::Wait`]),
/// `Internal` when the lock backend fails.
pub async fn acquire_with_policy(
    service: &Arc<dyn LockService>,
    name: &str,
    policy: LockPolicy,
    max_wait: Duration,
    retry_interval: Duration,
) -> Result<LeaseGuard, PipelineError> {
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        match service.acquire(name).await {
            Ok(lease) => return Ok(LeaseGuard::new(lease, Arc::clone(service))),
            Err(LockError::Held { name }) => {
                let now = tokio::time::Instant::now();
                if policy == LockPolicy::FailFast || now >= deadline {
                    return Err(PipelineError::LockConflict { name });
                }
                let pause = retry_interval.min(deadline - now);
                debug!(lock = %name, ?pause, "lock held, retrying");
                tokio::time::sleep(pause).await;
            }
            Err(err @ (LockError::Lost { .. } | LockError::Unavailable(_))) => {
                return Err(PipelineError::Internal(anyhow::Error::new(err)));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// LeaseGuard
// ---------------------------------------------------------------------------

/// Scoped ownership of a lease.
///
/// Call [`release`](Self::release) on the normal path. If the guard is
/// dropped instead (handler panic, request cancelled by the deadline) the
/// release is spawned onto the current runtime; without a runtime the lease
/// is left to expire.
pub struct LeaseGuard {
    lease: Option<Lease>,
    service: Arc<dyn LockService>,
}

impl LeaseGuard {
    fn new(lease: Lease, service: Arc<dyn LockService>) -> Self {
        Self {
            lease: Some(lease),
            service,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.lease.as_ref().map_or("", |lease| lease.name.as_str())
    }

    /// Renewal period for the held lease.
    #[must_use]
    pub fn renew_interval(&self) -> Duration {
        self.lease
            .as_ref()
            .map_or(Duration::from_secs(1), Lease::renew_interval)
    }

    /// Extends the held lease.
    ///
    /// # Errors
    ///
    /// `Lost` when the lease is no longer ours, `Unavailable` when the lock
    /// backend fails.
    pub async fn renew(&mut self) -> Result<(), LockError> {
        let Some(lease) = self.lease.as_ref() else {
            return Err(LockError::Lost {
                name: String::new(),
            });
        };
        let renewed = self.service.renew(lease).await?;
        self.lease = Some(renewed);
        Ok(())
    }

    pub async fn release(mut self) {
        if let Some(lease) = self.lease.take() {
            if let Err(err) = self.service.release(&lease).await {
                warn!(
                    lock = %lease.name,
                    error = %err,
                    "lease release failed, leaving it to expire"
                );
            }
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(lock = %lease.name, "no runtime to release lease, leaving it to expire");
            return;
        };
        let service = Arc::clone(&self.service);
        handle.spawn(async move {
            if let Err(err) = service.release(&lease).await {
                warn!(
                    lock = %lease.name,
                    error = %err,
                    "lease release failed, leaving it to expire"
                );
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Lock naming
// ---------------------------------------------------------------------------

/// Derives a lock name from a request. Returning `None` skips locking.
pub type LockKeyFn = Arc<dyn Fn(&ApiRequest) -> Option<String> + Send + Sync>;

/// How a route names the lock it takes.
#[derive(Clone)]
pub enum LockScope {
    /// One lock per named resource: `{namespace}/{kind}/{name}`. The name
    /// comes from the `name` path parameter, else the body's `name` field.
    Resource,
    /// One lock per resource kind in the namespace: `{namespace}/{kind}`.
    Kind,
    Custom(LockKeyFn),
}

impl LockScope {
    /// Resolves the lock name for `request` on a route of `kind`.
    ///
    /// # Errors
    ///
    /// `MissingIdentity` when the request has not been authenticated.
    pub fn lock_name(
        &self,
        kind: ResourceKind,
        request: &ApiRequest,
    ) -> Result<Option<String>, PipelineError> {
        let namespace = request
            .ctx
            .namespace()
            .ok_or(PipelineError::MissingIdentity)?;
        Ok(match self {
            Self::Resource => {
                let name = request
                    .ctx
                    .param("name")
                    .map(str::to_string)
                    .or_else(|| request.body_name());
                Some(match name {
                    Some(name) => format!("{namespace}/{kind}/{name}"),
                    None => format!("{namespace}/{kind}"),
                })
            }
            Self::Kind => Some(format!("{namespace}/{kind}")),
            Self::Custom(key_fn) => key_fn(request),
        })
    }
}

impl fmt::Debug for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource => f.write_str("Resource"),
            Self::Kind => f.write_str("Kind"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
