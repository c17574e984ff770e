//! Response cache storage.
//!
//! Defines [`CacheEntry`] and the [`CacheStore`] contract used by the
//! response cache middleware, the pure [`cache_key`] derivation, and the
//! in-memory [`InMemoryCacheStore`].

pub mod key;
pub mod memory;

pub use key::cache_key;
pub use memory::InMemoryCacheStore;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::service::config::CacheConfig;
use crate::service::operation::ApiResponse;

/// A memoized successful response.
///
/// Entries are immutable once written: a refresh replaces the whole entry,
/// so a reader never observes a half-updated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub status: u16,
    pub payload: Bytes,
    pub content_type: String,
    /// Whitelisted response headers only.
    pub headers: BTreeMap<String, String>,
    /// Millis since the Unix epoch after which the entry must not be served.
    pub expires_at_ms: u64,
}

impl CacheEntry {
    /// Captures `response` under `key`, keeping only headers `config`
    /// whitelists.
    #[must_use]
    pub fn from_response(
        key: impl Into<String>,
        response: &ApiResponse,
        config: &CacheConfig,
        expires_at_ms: u64,
    ) -> Self {
        let headers = response
            .headers
            .iter()
            .filter(|(name, _)| config.is_whitelisted(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            key: key.into(),
            status: response.status,
            payload: response.body.clone(),
            content_type: response.content_type.clone(),
            headers,
            expires_at_ms,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Rebuilds the response replayed on a cache hit.
    #[must_use]
    pub fn to_response(&self) -> ApiResponse {
        ApiResponse {
            status: self.status,
            content_type: self.content_type.clone(),
            headers: self.headers.clone(),
            body: self.payload.clone(),
        }
    }
}

/// Failure of the cache backend. The middleware treats it as a miss.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value store with per-entry expiry, shared by all requests.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the entry under `key` if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry>>, CacheError>;

    /// Stores `entry` under `key`, replacing any previous entry wholesale.
    ///
    /// `ttl` mirrors `entry.expires_at_ms` for backends with native expiry.
    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError>;

    /// Drops expired entries and returns how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}
