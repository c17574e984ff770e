//! Shared fixtures for middleware tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use gatehouse_core::{RequestContext, TenantIdentity};
use tower::Service;

use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};

/// Inner service that counts calls and echoes the tenant namespace.
#[derive(Clone, Default)]
pub struct Recorder {
    pub calls: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Service<ApiRequest> for Recorder {
    type Response = ApiResponse;
    type Error = PipelineError;
    type Future = PipelineFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ApiRequest) -> Self::Future {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let body = format!(
            "{{\"namespace\":\"{}\",\"call\":{n}}}",
            request.ctx.namespace().unwrap_or("")
        );
        Box::pin(async move {
            Ok(ApiResponse {
                status: 200,
                content_type: "application/json".to_string(),
                headers: [("x-request-id".to_string(), "req".to_string())]
                    .into_iter()
                    .collect(),
                body: Bytes::from(body),
            })
        })
    }
}

pub fn anonymous(method: &str, path: &str) -> ApiRequest {
    ApiRequest::new(RequestContext::new("trace-1", method, path), Bytes::new())
}

pub fn authed(namespace: &str, method: &str, path: &str) -> ApiRequest {
    let ctx = RequestContext::new("trace-1", method, path)
        .authenticated(TenantIdentity::new(namespace));
    ApiRequest::new(ctx, Bytes::new())
}
