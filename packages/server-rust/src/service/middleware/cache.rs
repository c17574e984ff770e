//! Response cache for read routes.
//!
//! Looks the request up by [`cache_key`] before the handler runs and replays
//! a fresh hit without calling it. On a miss the handler runs and a 2xx
//! response is stored with the configured TTL. The key is built from the
//! authenticated namespace in the request context, never from raw headers.
//! Concurrent misses on one key may both run the handler; the last write wins.

use std::sync::Arc;
use std::task::{Context, Poll};

use gatehouse_core::clock::deadline_after;
use gatehouse_core::ClockSource;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::cache::{cache_key, CacheEntry, CacheStore};
use crate::service::config::CacheConfig;
use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};

#[derive(Clone)]
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    config: Arc<CacheConfig>,
    clock: Arc<dyn ClockSource>,
}

impl CacheLayer {
    #[must_use]
    pub fn new(
        store: Arc<dyn CacheStore>,
        config: CacheConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock,
        }
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = CacheService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService {
            inner,
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[derive(Clone)]
pub struct CacheService<S> {
    inner: S,
    store: Arc<dyn CacheStore>,
    config: Arc<CacheConfig>,
    clock: Arc<dyn ClockSource>,
}

impl<S> Service<ApiRequest> for CacheService<S>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = PipelineError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = ApiResponse;
    type Error = PipelineError;
    type Future = PipelineFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: ApiRequest) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        // Disabled, or nothing to scope the entry to: plain pass-through.
        let key = match request.ctx.namespace() {
            Some(namespace) if self.config.enabled => {
                cache_key(request.ctx.path(), request.ctx.query(), namespace)
            }
            _ => return Box::pin(async move { inner.call(request).await }),
        };
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        let clock = Arc::clone(&self.clock);

        Box::pin(async move {
            let trace_id = request.ctx.trace_id().to_string();
            match store.get(&key).await {
                Ok(Some(entry)) => {
                    debug!(trace_id = %trace_id, key = %key, "cache hit");
                    metrics::counter!("gatehouse_cache_hits_total").increment(1);
                    return Ok(entry.to_response());
                }
                Ok(None) => {
                    debug!(trace_id = %trace_id, key = %key, "cache miss");
                    metrics::counter!("gatehouse_cache_misses_total").increment(1);
                }
                Err(err) => {
                    warn!(
                        trace_id = %trace_id,
                        key = %key,
                        error = %err,
                        "cache lookup failed, calling handler"
                    );
                    metrics::counter!("gatehouse_cache_misses_total").increment(1);
                }
            }

            let response = inner.call(request).await?;
            if response.is_success() {
                let ttl = config.ttl();
                let expires_at_ms = deadline_after(clock.now_millis(), ttl);
                let entry = CacheEntry::from_response(
                    key.clone(),
                    &response,
                    &config,
                    expires_at_ms,
                );
                if let Err(err) = store.set(&key, entry, ttl).await {
                    warn!(
                        trace_id = %trace_id,
                        key = %key,
                        error = %err,
                        "cache write failed"
                    );
                }
            }
            Ok(response)
        })
    }
}
