//! Resource validation before creation and deletion handlers.

use std::sync::Arc;
use std::task::{Context, Poll};

use gatehouse_core::ResourceKind;
use tower::{Layer, Service};

use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};
use crate::traits::{ResourceValidator, ValidateAction};

#[derive(Clone)]
pub struct ValidateLayer {
    validator: Arc<dyn ResourceValidator>,
    action: ValidateAction,
    kind: ResourceKind,
}

impl ValidateLayer {
    #[must_use]
    pub fn new(
        validator: Arc<dyn ResourceValidator>,
        action: ValidateAction,
        kind: ResourceKind,
    ) -> Self {
        Self {
            validator,
            action,
            kind,
        }
    }
}

impl<S> Layer<S> for ValidateLayer {
    type Service = ValidateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ValidateService {
            inner,
            validator: Arc::clone(&self.validator),
            action: self.action,
            kind: self.kind,
        }
    }
}

#[derive(Clone)]
pub struct ValidateService<S> {
    inner: S,
    validator: Arc<dyn ResourceValidator>,
    action: ValidateAction,
    kind: ResourceKind,
}

impl<S> Service<ApiRequest> for ValidateService<S>
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
        let validator = Arc::clone(&self.validator);
        let (action, kind) = (self.action, self.kind);

        Box::pin(async move {
            if let Err(err) = validator.validate(action, kind, &request).await {
                tracing::error!(
                    trace_id = %request.ctx.trace_id(),
                    namespace = request.ctx.namespace().unwrap_or(""),
                    action = action.as_str(),
                    kind = kind.as_str(),
                    error = %err,
                    "resource validation failed"
                );
                return Err(PipelineError::Validation(err));
            }
            inner.call(request).await
        })
    }
}
