//! Authentication gate.
//!
//! Runs first on every versioned route. On success the resolved tenant is
//! attached to the request context; on failure nothing downstream runs.

use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::service::operation::{ApiRequest, ApiResponse, PipelineError, PipelineFuture};
use crate::traits::Authenticator;

/// Header a client may use to name the namespace it is addressing. Only
/// used for audit logging of rejected requests.
const NAMESPACE_HINT: &str = "x-namespace";

#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthLayer {
    #[must_use]
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authenticator: Arc::clone(&self.authenticator),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Arc<dyn Authenticator>,
}

impl<S> Service<ApiRequest> for AuthService<S>
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

    fn call(&mut self, mut request: ApiRequest) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let authenticator = Arc::clone(&self.authenticator);

        Box::pin(async move {
            match authenticator.authenticate(&request.ctx).await {
                Ok(identity) => {
                    request.ctx = request.ctx.authenticated(identity);
                    inner.call(request).await
                }
                Err(err) => {
                    let ctx = &request.ctx;
                    tracing::error!(
                        trace_id = %ctx.trace_id(),
                        namespace = ctx.header(NAMESPACE_HINT).unwrap_or(""),
                        authorization = ctx.header("authorization").unwrap_or(""),
                        error = %err,
                        "authentication failed"
                    );
                    Err(PipelineError::AccessDenied(err))
                }
            }
        })
    }
}
