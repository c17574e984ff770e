//! Pipeline composition: wraps a route's terminal handler in its gates.

use std::sync::Arc;

use gatehouse_core::{ClockSource, SystemClock};
use tower::util::BoxCloneSyncService;
use tower::Layer;

use super::auth::AuthLayer;
use super::cache::CacheLayer;
use super::filter::FilterLayer;
use super::lock::LockLayer;
use super::metrics::MetricsLayer;
use super::quota::QuotaLayer;
use super::timeout::TimeoutLayer;
use super::validate::ValidateLayer;
use crate::cache::CacheStore;
use crate::lock::LockService;
use crate::quota::QuotaService;
use crate::service::config::PipelineConfig;
use crate::service::handler::HandlerService;
use crate::service::operation::{ApiRequest, ApiResponse, PipelineError};
use crate::service::registry::HandlerRegistry;
use crate::service::routes::RouteSpec;
use crate::traits::{Authenticator, RequestFilter, ResourceHandler, ResourceValidator};

/// A fully composed, type-erased route pipeline.
pub type RouteService = BoxCloneSyncService<ApiRequest, ApiResponse, PipelineError>;

/// Collaborators shared by every route pipeline.
#[derive(Clone)]
pub struct PipelineDeps {
    pub authenticator: Arc<dyn Authenticator>,
    pub handlers: HandlerRegistry,
    pub cache: Arc<dyn CacheStore>,
    pub locks: Arc<dyn LockService>,
    pub quota: Arc<QuotaService>,
    pub validator: Option<Arc<dyn ResourceValidator>>,
    pub filters: Vec<Arc<dyn RequestFilter>>,
    pub clock: Arc<dyn ClockSource>,
}

impl PipelineDeps {
    /// Dependencies with no validator, no filters and the system clock.
    #[must_use]
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        handlers: HandlerRegistry,
        cache: Arc<dyn CacheStore>,
        locks: Arc<dyn LockService>,
        quota: Arc<QuotaService>,
    ) -> Self {
        Self {
            authenticator,
            handlers,
            cache,
            locks,
            quota,
            validator: None,
            filters: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn ResourceValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn RequestFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }
}

/// Builds the pipeline for one route around `handler`.
///
/// Request flow, outermost first:
/// 1. `MetricsLayer` -- request span, counters, duration
/// 2. `TimeoutLayer` -- per-request deadline
/// 3. `AuthLayer` -- resolves the tenant; nothing below runs without one
/// 4. `FilterLayer` -- deployment-specific request filters
/// 5. `ValidateLayer` -- resource validation on create/delete routes
/// 6. `LockLayer` -- lease held until the handler completes
/// 7. `QuotaLayer` -- admission check under the lock
/// 8. `CacheLayer` -- early hit interception, write-back after success
/// 9. `HandlerService` -- the terminal handler
///
/// Stages a route does not declare are left out entirely.
#[must_use]
pub fn build_route_pipeline(
    spec: &RouteSpec,
    handler: Arc<dyn ResourceHandler>,
    deps: &PipelineDeps,
    config: &PipelineConfig,
) -> RouteService {
    let mut svc = RouteService::new(HandlerService::new(handler));

    if spec.cache {
        let layer = CacheLayer::new(
            Arc::clone(&deps.cache),
            config.cache.clone(),
            Arc::clone(&deps.clock),
        );
        svc = RouteService::new(layer.layer(svc));
    }
    if spec.quota {
        svc = RouteService::new(QuotaLayer::new(Arc::clone(&deps.quota), spec.kind).layer(svc));
    }
    if let Some(scope) = &spec.lock {
        let layer = LockLayer::new(
            Arc::clone(&deps.locks),
            scope.clone(),
            spec.kind,
            &config.lock,
        );
        svc = RouteService::new(layer.layer(svc));
    }
    if let (Some(action), Some(validator)) = (spec.validate, &deps.validator) {
        let layer = ValidateLayer::new(Arc::clone(validator), action, spec.kind);
        svc = RouteService::new(layer.layer(svc));
    }
    if spec.auth {
        if !deps.filters.is_empty() {
            svc = RouteService::new(FilterLayer::new(deps.filters.clone()).layer(svc));
        }
        svc = RouteService::new(AuthLayer::new(Arc::clone(&deps.authenticator)).layer(svc));
    }
    svc = RouteService::new(TimeoutLayer::new(config.request_timeout()).layer(svc));
    RouteService::new(MetricsLayer::new(spec.operation).layer(svc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
