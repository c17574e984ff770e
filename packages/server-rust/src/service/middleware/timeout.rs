//! Per-request deadline.
//!
//! Rejects requests whose pipeline runs longer than the configured timeout
//! with `PipelineError::Timeout`. Dropping the inner future on expiry drops
//! any lease guard it holds, which releases the lease.

use std::task::{Context, Poll};
use std::time::Duration;

use tower::{Layer, Service};

use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};

#[derive(Debug, Clone)]
pub struct TimeoutLayer {
    timeout: Duration,
}

impl TimeoutLayer {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            timeout: self.timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
    timeout: Duration,
}

impl<S> Service<ApiRequest> for TimeoutService<S>
where
    S: Service<ApiRequest, Response = ApiResponse, Error = PipelineError> + Send,
    S::Future: Send + 'static,
{
    type Response = ApiResponse;
    type Error = PipelineError;
    type Future = PipelineFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: ApiRequest) -> Self::Future {
        let timeout = self.timeout;
        let trace_id = request.ctx.trace_id().to_string();
        let fut = self.inner.call(request);
        Box::pin(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let timeout_ms = timeout.as_millis() as u64;
                    tracing::error!(trace_id = %trace_id, timeout_ms, "request deadline exceeded");
                    Err(PipelineError::Timeout { timeout_ms })
                }
            }
        })
    }
}
