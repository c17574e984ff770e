//! Terminal pipeline stage: runs a [`ResourceHandler`] and serializes its payload.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use gatehouse_core::Payload;
use tower::Service;

use crate::service::operation::{
    ApiRequest, ApiResponse, HandlerError, PipelineError, PipelineFuture,
};
use crate::traits::ResourceHandler;

const JSON: &str = "application/json";

/// Innermost service of every route pipeline.
#[derive(Clone)]
pub struct HandlerService {
    handler: Arc<dyn ResourceHandler>,
}

impl HandlerService {
    #[must_use]
    pub fn new(handler: Arc<dyn ResourceHandler>) -> Self {
        Self { handler }
    }
}

impl Service<ApiRequest> for HandlerService {
    type Response = ApiResponse;
    type Error = PipelineError;
    type Future = PipelineFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: ApiRequest) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        Box::pin(async move {
            let payload = handler.handle(request).await?;
            into_response(payload)
        })
    }
}

/// Serializes a handler payload. A handler-supplied `content-type` header
/// overrides the JSON default.
///
/// # Errors
///
/// `Internal` if the body cannot be serialized.
pub fn into_response(mut payload: Payload) -> Result<ApiResponse, PipelineError> {
    let body = serde_json::to_vec(&payload.body)
        .map_err(|e| PipelineError::Internal(anyhow::Error::new(e).context("serialize payload")))?;
    let content_type = payload
        .headers
        .remove("content-type")
        .unwrap_or_else(|| JSON.to_string());
    Ok(ApiResponse {
        status: payload.status,
        content_type,
        headers: payload.headers,
        body: Bytes::from(body),
    })
}

// ---------------------------------------------------------------------------
// Closure handlers
// ---------------------------------------------------------------------------

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ResourceHandler for FnHandler<F>
where
    F: Fn(ApiRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send,
{
    async fn handle(&self, request: ApiRequest) -> Result<Payload, HandlerError> {
        (self.0)(request).await
    }
}

/// Wraps an async closure as a [`ResourceHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ResourceHandler>
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
