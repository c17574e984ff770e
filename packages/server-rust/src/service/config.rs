use std::collections::HashMap;
use std::time::Duration;

use gatehouse_core::ResourceKind;
use serde::{Deserialize, Serialize};

use crate::lock::LockPolicy;

/// Default cache entry lifetime.
pub const DEFAULT_CACHE_DURATION_MS: u64 = 2_000;

/// Pipeline configuration shared by every route.
///
/// Controls caching, locking, quota admission and the per-request deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cache: CacheConfig,
    pub lock: LockConfig,
    pub quota: QuotaConfig,
    /// Deadline for a whole request, auth through handler, in milliseconds.
    pub request_timeout_ms: u64,
    pub features: RouteFeatures,
}

impl PipelineConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            lock: LockConfig::default(),
            quota: QuotaConfig::default(),
            request_timeout_ms: 30_000,
            features: RouteFeatures::default(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Off by default; when off, cacheable routes pass straight through.
    pub enabled: bool,
    /// Entry lifetime in milliseconds. Zero means the default.
    pub duration_ms: u64,
    /// Response headers kept in cached entries, case-insensitive.
    pub header_whitelist: Vec<String>,
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        if self.duration_ms == 0 {
            Duration::from_millis(DEFAULT_CACHE_DURATION_MS)
        } else {
            Duration::from_millis(self.duration_ms)
        }
    }

    #[must_use]
    pub fn is_whitelisted(&self, header: &str) -> bool {
        self.header_whitelist
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(header))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_ms: DEFAULT_CACHE_DURATION_MS,
            header_whitelist: vec!["content-type".to_string()],
        }
    }
}

/// Lease settings for locked routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub policy: LockPolicy,
    /// Lease lifetime; reclaims locks whose holder died.
    pub lease_ttl_ms: u64,
    /// Longest a request waits for a held lock under the `wait` policy.
    pub max_wait_ms: u64,
    pub retry_interval_ms: u64,
}

impl LockConfig {
    #[must_use]
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_ms)
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Retry pause, never zero so waiting cannot spin.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(1))
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            policy: LockPolicy::Wait,
            lease_ttl_ms: 30_000,
            max_wait_ms: 5_000,
            retry_interval_ms: 50,
        }
    }
}

/// Quota admission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Upper bound on one collector call; a slow collector rejects the request.
    pub collector_timeout_ms: u64,
    /// Limits applied to every namespace. Kinds not listed are unlimited.
    pub default_limits: HashMap<ResourceKind, u64>,
    /// Per-namespace overrides of `default_limits`.
    pub namespace_limits: HashMap<String, HashMap<ResourceKind, u64>>,
}

impl QuotaConfig {
    #[must_use]
    pub fn collector_timeout(&self) -> Duration {
        Duration::from_millis(self.collector_timeout_ms)
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            collector_timeout_ms: 3_000,
            default_limits: HashMap::new(),
            namespace_limits: HashMap::new(),
        }
    }
}

/// Plugin-dependent route groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteFeatures {
    /// Mount function source and version routes.
    pub functions: bool,
    /// Mount object storage bucket routes.
    pub objects: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(2));
        assert_eq!(config.lock.policy, LockPolicy::Wait);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.quota.collector_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn zero_cache_duration_falls_back_to_default() {
        let cache = CacheConfig {
            duration_ms: 0,
            ..CacheConfig::default()
        };
        assert_eq!(cache.ttl(), Duration::from_millis(DEFAULT_CACHE_DURATION_MS));
    }

    #[test]
    fn whitelist_is_case_insensitive() {
        let cache = CacheConfig::default();
        assert!(cache.is_whitelisted("Content-Type"));
        assert!(!cache.is_whitelisted("x-request-id"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "cache": { "enabled": true, "duration_ms": 5000 },
                "lock": { "policy": "fail_fast" },
                "quota": {
                    "default_limits": { "node": 10 },
                    "namespace_limits": { "big": { "node": 100 } }
                },
                "features": { "functions": true }
            }"#,
        )
        .unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(5));
        assert_eq!(config.cache.header_whitelist, vec!["content-type"]);
        assert_eq!(config.lock.policy, LockPolicy::FailFast);
        assert_eq!(config.lock.max_wait_ms, 5_000);
        assert_eq!(config.quota.default_limits[&ResourceKind::Node], 10);
        assert_eq!(config.quota.namespace_limits["big"][&ResourceKind::Node], 100);
        assert!(config.features.functions);
        assert!(!config.features.objects);
        assert_eq!(config.request_timeout_ms, 30_000);
    }
}
