//! Request instrumentation.
//!
//! Wraps each request in a `request` span, records duration and outcome, and
//! feeds the `metrics` facade.

use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Outermost layer of a route pipeline; labels everything with the route's operation id.
#[derive(Debug, Clone)]
pub struct MetricsLayer {
    operation: &'static str,
}

impl MetricsLayer {
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            operation: self.operation,
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
    operation: &'static str,
}

impl<S> Service<ApiRequest> for MetricsService<S>
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
        let operation = self.operation;
        let span = info_span!(
            "request",
            trace_id = %request.ctx.trace_id(),
            operation = operation,
            method = %request.ctx.method(),
            path = %request.ctx.path(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(request);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                let outcome = match &result {
                    Ok(_) => "ok",
                    Err(err) => err.code().as_str(),
                };
                if let Some(gate) = result.as_ref().err().and_then(PipelineError::gate) {
                    metrics::counter!("gatehouse_gate_rejections_total", "gate" => gate)
                        .increment(1);
                }
                metrics::counter!(
                    "gatehouse_requests_total",
                    "operation" => operation,
                    "outcome" => outcome
                )
                .increment(1);
                metrics::histogram!("gatehouse_request_duration_seconds", "operation" => operation)
                    .record(elapsed.as_secs_f64());

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);
                tracing::info!(duration_ms, outcome, "request complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
