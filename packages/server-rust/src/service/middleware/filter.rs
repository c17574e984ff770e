//! Deployment-specific request filters, run in registration order after auth.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};
use crate::traits::RequestFilter;

#[derive(Clone)]
pub struct FilterLayer {
    filters: Arc<[Arc<dyn RequestFilter>]>,
}

impl FilterLayer {
    #[must_use]
    pub fn new(filters: Vec<Arc<dyn RequestFilter>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }
}

impl<S> Layer<S> for FilterLayer {
    type Service = FilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FilterService {
            inner,
            filters: Arc::clone(&self.filters),
        }
    }
}

#[derive(Clone)]
pub struct FilterService<S> {
    inner: S,
    filters: Arc<[Arc<dyn RequestFilter>]>,
}

impl<S> Service<ApiRequest> for FilterService<S>
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
        let filters = Arc::clone(&self.filters);

        Box::pin(async move {
            for filter in filters.iter() {
                if let Err(err) = filter.filter(&request.ctx).await {
                    tracing::warn!(
                        trace_id = %request.ctx.trace_id(),
                        namespace = request.ctx.namespace().unwrap_or(""),
                        error = %err,
                        "request filter rejected request"
                    );
                    return Err(PipelineError::Handler(err));
                }
            }
            inner.call(request).await
        })
    }
}
