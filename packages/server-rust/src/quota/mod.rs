//! Quota admission control.
//!
//! Before a creation handler runs, [`QuotaService::check`] counts the live
//! population of the resource kind through its registered
//! [`QuotaCollector`] and rejects the request if one more would exceed the
//! namespace's limit. Counts are never stored, so they cannot drift from
//! the real population. Every failure to decide fails closed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use gatehouse_core::ResourceKind;

use crate::service::config::QuotaConfig;
use crate::traits::{QuotaCollector, QuotaLimits};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    #[error("quota exceeded for {kind} in namespace {namespace}: limit {limit}, current {used}")]
    Exceeded {
        namespace: String,
        kind: ResourceKind,
        limit: u64,
        used: u64,
    },
    #[error("quota collector for {kind} unavailable: {reason}")]
    CollectorUnavailable { kind: ResourceKind, reason: String },
    #[error("quota limit lookup failed: {reason}")]
    LimitUnavailable { reason: String },
}

// ---------------------------------------------------------------------------
// CollectorRegistry
// ---------------------------------------------------------------------------

/// Per-kind quota collectors, owned by the server rather than a global.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: Arc<DashMap<ResourceKind, Arc<dyn QuotaCollector>>>,
}

impl CollectorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the collector for `kind`.
    pub fn register(&self, kind: ResourceKind, collector: Arc<dyn QuotaCollector>) {
        self.collectors.insert(kind, collector);
    }

    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> Option<Arc<dyn QuotaCollector>> {
        self.collectors.get(&kind).map(|c| Arc::clone(c.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// StaticQuotaLimits
// ---------------------------------------------------------------------------

/// Limits read from configuration: per-namespace overrides, then defaults.
#[derive(Debug, Clone, Default)]
pub struct StaticQuotaLimits {
    defaults: HashMap<ResourceKind, u64>,
    namespaces: HashMap<String, HashMap<ResourceKind, u64>>,
}

impl StaticQuotaLimits {
    #[must_use]
    pub fn from_config(config: &QuotaConfig) -> Self {
        Self {
            defaults: config.default_limits.clone(),
            namespaces: config.namespace_limits.clone(),
        }
    }

    #[must_use]
    pub fn with_default(mut self, kind: ResourceKind, limit: u64) -> Self {
        self.defaults.insert(kind, limit);
        self
    }

    #[must_use]
    pub fn with_namespace_limit(
        mut self,
        namespace: impl Into<String>,
        kind: ResourceKind,
        limit: u64,
    ) -> Self {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .insert(kind, limit);
        self
    }
}

#[async_trait]
impl QuotaLimits for StaticQuotaLimits {
    async fn limit(&self, namespace: &str, kind: ResourceKind) -> anyhow::Result<Option<u64>> {
        let limit = self
            .namespaces
            .get(namespace)
            .and_then(|limits| limits.get(&kind))
            .or_else(|| self.defaults.get(&kind))
            .copied();
        Ok(limit)
    }
}

// ---------------------------------------------------------------------------
// QuotaService
// ---------------------------------------------------------------------------

/// Admission check shared by all creation routes.
pub struct QuotaService {
    limits: Arc<dyn QuotaLimits>,
    collectors: CollectorRegistry,
    collector_timeout: Duration,
}

impl QuotaService {
    #[must_use]
    pub fn new(
        limits: Arc<dyn QuotaLimits>,
        collectors: CollectorRegistry,
        collector_timeout: Duration,
    ) -> Self {
        Self {
            limits,
            collectors,
            collector_timeout,
        }
    }

    /// Service built from `config` with [`StaticQuotaLimits`].
    #[must_use]
    pub fn from_config(config: &QuotaConfig, collectors: CollectorRegistry) -> Self {
        Self::new(
            Arc::new(StaticQuotaLimits::from_config(config)),
            collectors,
            config.collector_timeout(),
        )
    }

    #[must_use]
    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }

    /// Admits one more `kind` in `namespace` using the registered collector.
    ///
    /// # Errors
    ///
    /// `Exceeded` when `count + 1 > limit`; `CollectorUnavailable` when the
    /// kind is limited but has no collector, or the collector fails or
    /// times out; `LimitUnavailable` when the limit lookup fails.
    pub async fn check(&self, namespace: &str, kind: ResourceKind) -> Result<(), QuotaError> {
        let Some(limit) = self.limit(namespace, kind).await? else {
            return Ok(());
        };
        let collector = self
            .collectors
            .get(kind)
            .ok_or_else(|| QuotaError::CollectorUnavailable {
                kind,
                reason: "no collector registered".to_string(),
            })?;
        self.admit(namespace, kind, limit, collector.as_ref()).await
    }

    /// Admits one more `kind` in `namespace` counting with `collector`.
    ///
    /// # Errors
    ///
    /// As [`check`](Self::check).
    pub async fn check_with(
        &self,
        namespace: &str,
        kind: ResourceKind,
        collector: &dyn QuotaCollector,
    ) -> Result<(), QuotaError> {
        match self.limit(namespace, kind).await? {
            Some(limit) => self.admit(namespace, kind, limit, collector).await,
            None => Ok(()),
        }
    }

    async fn limit(&self, namespace: &str, kind: ResourceKind) -> Result<Option<u64>, QuotaError> {
        self.limits
            .limit(namespace, kind)
            .await
            .map_err(|e| QuotaError::LimitUnavailable {
                reason: format!("{e:#}"),
            })
    }

    async fn admit(
        &self,
        namespace: &str,
        kind: ResourceKind,
        limit: u64,
        collector: &dyn QuotaCollector,
    ) -> Result<(), QuotaError> {
        let used = match tokio::time::timeout(self.collector_timeout, collector.count(namespace))
            .await
        {
            Ok(Ok(used)) => used,
            Ok(Err(e)) => {
                return Err(QuotaError::CollectorUnavailable {
                    kind,
                    reason: format!("{e:#}"),
                })
            }
            Err(_elapsed) => {
                return Err(QuotaError::CollectorUnavailable {
                    kind,
                    reason: format!(
                        "collector timed out after {}ms",
                        self.collector_timeout.as_millis()
                    ),
                })
            }
        };
        if used.saturating_add(1) > limit {
            return Err(QuotaError::Exceeded {
                namespace: namespace.to_string(),
                kind,
                limit,
                used,
            });
        }
        Ok(())
    }
}
