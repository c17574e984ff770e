//! Admin server with deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener and
//! `serve()` accepts connections until shutdown. Between `start()` and
//! `serve()` the caller can still read the bound port or share the
//! shutdown controller.

use std::collections::{BTreeMap, HashMap};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request};
use axum::routing::{get, on, MethodFilter, MethodRouter};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::config::NetworkConfig;
use super::handlers::{dispatch, health_handler, method_not_allowed, not_found, AppState};
use super::middleware::with_http_layers;
use super::shutdown::ShutdownController;
use crate::service::config::PipelineConfig;
use crate::service::middleware::{build_route_pipeline, PipelineDeps};
use crate::service::routes::admin_routes;
use crate::service::worker::{BackgroundWorker, ExpirySweeper};

/// The multi-tenant admin API server.
///
/// 1. `new()` -- allocates the shutdown controller
/// 2. `start()` -- binds the listener
/// 3. `serve()` -- serves until the shutdown future resolves, then drains
pub struct AdminServer {
    network: NetworkConfig,
    pipeline: PipelineConfig,
    deps: PipelineDeps,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    start_time: Instant,
}

impl AdminServer {
    #[must_use]
    pub fn new(network: NetworkConfig, pipeline: PipelineConfig, deps: PipelineDeps) -> Self {
        Self {
            network,
            pipeline,
            deps,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the router: `/health`, every admin route whose operation has
    /// a registered handler, the not-found and method-not-allowed fallbacks,
    /// and the HTTP layers.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.network.clone()),
            start_time: self.start_time,
        };

        // axum wants one MethodRouter per path.
        let mut by_path: BTreeMap<&'static str, MethodRouter<AppState>> = BTreeMap::new();
        let mut mounted = 0_usize;
        for spec in admin_routes(&self.pipeline.features) {
            let Some(handler) = self.deps.handlers.get(spec.operation) else {
                debug!(operation = spec.operation, "no handler registered, route not mounted");
                continue;
            };
            let Ok(filter) = MethodFilter::try_from(spec.method.clone()) else {
                warn!(
                    method = %spec.method,
                    path = spec.path,
                    "unroutable method, route not mounted"
                );
                continue;
            };
            let route = build_route_pipeline(&spec, handler, &self.deps, &self.pipeline);
            let route_state = state.clone();
            let method_router = on(
                filter,
                move |params: Result<Path<HashMap<String, String>>, PathRejection>,
                      request: Request| {
                    dispatch(route.clone(), route_state.clone(), params, request)
                },
            );
            let merged = match by_path.remove(spec.path) {
                Some(existing) => existing.merge(method_router),
                None => method_router,
            };
            by_path.insert(spec.path, merged);
            mounted += 1;
        }
        info!(routes = mounted, "admin routes mounted");

        let mut router = Router::new().route("/health", get(health_handler));
        for (path, method_router) in by_path {
            router = router.route(path, method_router.fallback(method_not_allowed));
        }
        let router = router.fallback(not_found).with_state(state);
        with_http_layers(router, &self.network)
    }

    /// Binds the listener and returns the bound port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.network.host, self.network.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.network.host, port, "admin listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests for
    /// up to `shutdown_timeout`. The expiry sweeper runs for the lifetime of
    /// the call.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = self.build_router();
        let ctrl = Arc::clone(&self.shutdown);
        let drain_timeout = self.network.shutdown_timeout;

        let mut sweeper = BackgroundWorker::start(
            ExpirySweeper::new(Arc::clone(&self.deps.cache), Arc::clone(&self.deps.locks)),
            self.network.sweep_interval(),
        );

        let signal_ctrl = Arc::clone(&ctrl);
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("shutdown signalled, draining");
                signal_ctrl.trigger_shutdown();
            })
            .into_future();

        let mut triggered = ctrl.shutdown_receiver();
        let drain_deadline = async move {
            let _ = triggered.wait_for(|triggered| *triggered).await;
            tokio::time::sleep(drain_timeout).await;
        };

        ctrl.set_ready();
        let result = tokio::select! {
            result = server => result.map_err(anyhow::Error::from),
            () = drain_deadline => {
                warn!(
                    in_flight = ctrl.in_flight_count(),
                    "drain timeout expired, abandoning in-flight requests"
                );
                Ok(())
            }
        };

        sweeper.stop().await;
        if ctrl.wait_for_drain(drain_timeout).await {
            info!("admin server stopped");
        }
        result
    }
}
