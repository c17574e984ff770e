//! Write serialization.
//!
//! Acquires the route's lease before the inner stages run, renews it while
//! they run and releases it on every exit path: explicitly after the inner
//! future resolves, or through the guard's drop on panic and cancellation.
//! If a renewal fails the inner future is dropped and the request ends in a
//! lock conflict, so no two requests ever run under the same lease.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use gatehouse_core::ResourceKind;
use tokio::time::{Instant, MissedTickBehavior};
use tower::{Layer, Service};

use crate::lock::{acquire_with_policy, LockPolicy, LockScope, LockService};
use crate::service::config::LockConfig;
use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};

#[derive(Clone)]
struct LockSettings {
    service: Arc<dyn LockService>,
    scope: LockScope,
    kind: ResourceKind,
    policy: LockPolicy,
    max_wait: Duration,
    retry_interval: Duration,
}

#[derive(Clone)]
pub struct LockLayer {
    settings: Arc<LockSettings>,
}

impl LockLayer {
    #[must_use]
    pub fn new(
        service: Arc<dyn LockService>,
        scope: LockScope,
        kind: ResourceKind,
        config: &LockConfig,
    ) -> Self {
        Self {
            settings: Arc::new(LockSettings {
                service,
                scope,
                kind,
                policy: config.policy,
                max_wait: config.max_wait(),
                retry_interval: config.retry_interval(),
            }),
        }
    }
}

impl<S> Layer<S> for LockLayer {
    type Service = LockMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LockMiddleware {
            inner,
            settings: Arc::clone(&self.settings),
        }
    }
}

#[derive(Clone)]
pub struct LockMiddleware<S> {
    inner: S,
    settings: Arc<LockSettings>,
}

impl<S> Service<ApiRequest> for LockMiddleware<S>
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
        let settings = Arc::clone(&self.settings);

        Box::pin(async move {
            let Some(name) = settings.scope.lock_name(settings.kind, &request)? else {
                return inner.call(request).await;
            };
            let mut guard = match acquire_with_policy(
                &settings.service,
                &name,
                settings.policy,
                settings.max_wait,
                settings.retry_interval,
            )
            .await
            {
                Ok(guard) => guard,
                Err(err) => {
                    tracing::error!(
                        trace_id = %request.ctx.trace_id(),
                        lock = %name,
                        error = %err,
                        "lock acquisition failed"
                    );
                    return Err(err);
                }
            };
            let trace_id = request.ctx.trace_id().to_string();
            let mut call = std::pin::pin!(inner.call(request));
            let period = guard.renew_interval();
            let mut renewals = tokio::time::interval_at(Instant::now() + period, period);
            renewals.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let result = loop {
                tokio::select! {
                    biased;
                    result = &mut call => break result,
                    _ = renewals.tick() => {
                        if let Err(err) = guard.renew().await {
                            tracing::error!(
                                trace_id = %trace_id,
                                lock = %name,
                                error = %err,
                                "lease renewal failed, abandoning request"
                            );
                            break Err(PipelineError::LockConflict { name: name.clone() });
                        }
                    }
                }
            };
            guard.release().await;
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use gatehouse_core::{ErrorCode, ManualClock};
    use tower::ServiceExt;

    use super::*;
    use crate::lock::InMemoryLockService;
    use crate::service::middleware::testing::{authed, Recorder};

    /// Records the interval during which it ran.
    #[derive(Clone)]
    struct Hold {
        work: Duration,
        spans: Arc<Mutex<Vec<(Instant, Instant)>>>,
    }

    impl Hold {
        fn new(work: Duration) -> Self {
            Self {
                work,
                spans: Arc::default(),
            }
        }
    }

    impl Default for Hold {
        fn default() -> Self {
            Self::new(Duration::from_millis(100))
        }
    }

    impl Service<ApiRequest> for Hold {
        type Response = ApiResponse;
        type Error = PipelineError;
        type Future = PipelineFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, request: ApiRequest) -> Self::Future {
            let spans = Arc::clone(&self.spans);
            let work = self.work;
            Box::pin(async move {
                let start = Instant::now();
                tokio::time::sleep(work).await;
                spans.lock().unwrap().push((start, Instant::now()));
                Recorder::default().oneshot(request).await
            })
        }
    }

    fn locks() -> Arc<dyn LockService> {
        Arc::new(InMemoryLockService::with_clock(
            Duration::from_secs(30),
            Arc::new(ManualClock::new(0)),
        ))
    }

    fn config(policy: LockPolicy) -> LockConfig {
        LockConfig {
            policy,
            max_wait_ms: 1_000,
            retry_interval_ms: 10,
            ..LockConfig::default()
        }
    }

    fn put_app() -> ApiRequest {
        let mut request = authed("ns1", "PUT", "/v1/apps/app1");
        request.ctx = request.ctx.with_param("name", "app1");
        request
    }

    #[tokio::test(start_paused = true)]
    async fn wait_policy_serializes_same_key() {
        let hold = Hold::default();
        let layer = LockLayer::new(
            locks(),
            LockScope::Resource,
            ResourceKind::Application,
            &config(LockPolicy::Wait),
        );
        let a = layer.layer(hold.clone()).oneshot(put_app());
        let b = layer.layer(hold.clone()).oneshot(put_app());
        let (ra, rb) = tokio::join!(a, b);
        assert!(ra.is_ok() && rb.is_ok());

        let mut spans = hold.spans.lock().unwrap().clone();
        spans.sort();
        assert_eq!(spans.len(), 2);
        assert!(spans[0].1 <= spans[1].0, "lock hold intervals overlap");
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_policy_rejects_concurrent_writer() {
        let hold = Hold::default();
        let layer = LockLayer::new(
            locks(),
            LockScope::Resource,
            ResourceKind::Application,
            &config(LockPolicy::FailFast),
        );
        let a = layer.layer(hold.clone()).oneshot(put_app());
        let b = layer.layer(hold.clone()).oneshot(put_app());
        let (ra, rb) = tokio::join!(a, b);

        let failures: Vec<_> = [ra, rb].into_iter().filter_map(Result::err).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code(), ErrorCode::LockConflict);
        assert_eq!(hold.spans.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_run_in_parallel() {
        let hold = Hold::default();
        let layer = LockLayer::new(
            locks(),
            LockScope::Resource,
            ResourceKind::Application,
            &config(LockPolicy::FailFast),
        );
        let mut other = authed("ns1", "PUT", "/v1/apps/app2");
        other.ctx = other.ctx.with_param("name", "app2");
        let (ra, rb) = tokio::join!(
            layer.layer(hold.clone()).oneshot(put_app()),
            layer.layer(hold.clone()).oneshot(other)
        );
        assert!(ra.is_ok() && rb.is_ok());
    }

    #[tokio::test]
    async fn lease_is_released_after_handler_error() {
        let service = locks();
        let layer = LockLayer::new(
            Arc::clone(&service),
            LockScope::Resource,
            ResourceKind::Application,
            &config(LockPolicy::FailFast),
        );
        let failing = tower::service_fn(|_req: ApiRequest| async {
            Err::<ApiResponse, _>(PipelineError::Handler(
                crate::service::operation::HandlerError::invalid("bad app"),
            ))
        });
        let err = layer.layer(failing).oneshot(put_app()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(service.acquire("ns1/application/app1").await.is_ok());
    }

    #[tokio::test]
    async fn lease_outlives_a_handler_slower_than_its_ttl() {
        // Wall-clock leases far shorter than the handler's work.
        let service: Arc<dyn LockService> =
            Arc::new(InMemoryLockService::new(Duration::from_millis(100)));
        let hold = Hold::new(Duration::from_millis(300));
        let layer = LockLayer::new(
            service,
            LockScope::Resource,
            ResourceKind::Application,
            &LockConfig {
                policy: LockPolicy::Wait,
                max_wait_ms: 2_000,
                retry_interval_ms: 10,
                ..LockConfig::default()
            },
        );
        let (ra, rb) = tokio::join!(
            layer.layer(hold.clone()).oneshot(put_app()),
            layer.layer(hold.clone()).oneshot(put_app())
        );
        assert!(ra.is_ok() && rb.is_ok());

        let mut spans = hold.spans.lock().unwrap().clone();
        spans.sort();
        assert_eq!(spans.len(), 2);
        assert!(spans[0].1 <= spans[1].0, "writers overlapped");
    }

    #[tokio::test(start_paused = true)]
    async fn losing_the_lease_abandons_the_request() {
        let clock = Arc::new(ManualClock::new(0));
        let service: Arc<dyn LockService> = Arc::new(InMemoryLockService::with_clock(
            Duration::from_millis(90),
            clock.clone(),
        ));
        let thief = Arc::clone(&service);
        let finished = Arc::new(Mutex::new(false));
        let done = Arc::clone(&finished);
        let handler = tower::service_fn(move |request: ApiRequest| {
            let clock = Arc::clone(&clock);
            let thief = Arc::clone(&thief);
            let done = Arc::clone(&done);
            async move {
                // Stall past expiry and let another writer take the name.
                clock.advance(Duration::from_millis(200));
                thief.acquire("ns1/application/app1").await.unwrap();
                tokio::time::sleep(Duration::from_secs(1)).await;
                *done.lock().unwrap() = true;
                Recorder::default().oneshot(request).await
            }
        });
        let layer = LockLayer::new(
            service,
            LockScope::Resource,
            ResourceKind::Application,
            &config(LockPolicy::FailFast),
        );

        let err = layer.layer(handler).oneshot(put_app()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::LockConflict);
        assert!(!*finished.lock().unwrap());
    }
}
