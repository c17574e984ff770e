//! Quota admission stage for creation routes.

use std::sync::Arc;
use std::task::{Context, Poll};

use gatehouse_core::ResourceKind;
use tower::{Layer, Service};

use crate::quota::QuotaService;
use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};

#[derive(Clone)]
pub struct QuotaLayer {
    quota: Arc<QuotaService>,
    kind: ResourceKind,
}

impl QuotaLayer {
    #[must_use]
    pub fn new(quota: Arc<QuotaService>, kind: ResourceKind) -> Self {
        Self { quota, kind }
    }
}

impl<S> Layer<S> for QuotaLayer {
    type Service = QuotaMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        QuotaMiddleware {
            inner,
            quota: Arc::clone(&self.quota),
            kind: self.kind,
        }
    }
}

#[derive(Clone)]
pub struct QuotaMiddleware<S> {
    inner: S,
    quota: Arc<QuotaService>,
    kind: ResourceKind,
}

impl<S> Service<ApiRequest> for QuotaMiddleware<S>
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
        let quota = Arc::clone(&self.quota);
        let kind = self.kind;

        Box::pin(async move {
            let namespace = request
                .ctx
                .namespace()
                .ok_or(PipelineError::MissingIdentity)?;
            if let Err(err) = quota.check(namespace, kind).await {
                tracing::error!(
                    trace_id = %request.ctx.trace_id(),
                    namespace,
                    kind = kind.as_str(),
                    error = %err,
                    "quota check failed"
                );
                return Err(err.into());
            }
            inner.call(request).await
        })
    }
}
